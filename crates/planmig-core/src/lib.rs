//! planmig core - headless library for copying maintenance plans between two
//! REST-backed stores.
//!
//! A run walks a list of equipment model names. For each model the pipeline
//! resolves the model on both stores, aligns maintenance intervals by their
//! hour value, copies tasks (skipping ones the destination already has) and
//! then copies the parts of every mapped task. Progress is checkpointed after
//! every model so an interrupted run can resume.
//!
//! The `planmig` binary wraps this crate with argument parsing and logging.
//!
//! # Example
//!
//! ```rust,ignore
//! use planmig_core::{FileCheckpoint, MigrationOptions, Migrator, RestClient, RestStore, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> planmig_core::Result<()> {
//!     let settings = Settings::from_env(Default::default())?;
//!     let source = RestStore::new(RestClient::new("source", &settings.source)?, settings.tables.clone());
//!     let destination =
//!         RestStore::new(RestClient::new("destination", &settings.destination)?, settings.tables.clone());
//!
//!     let migrator = Migrator::new(
//!         Arc::new(source),
//!         Arc::new(destination),
//!         Arc::new(FileCheckpoint::new(&settings.checkpoint_path)),
//!         MigrationOptions::default(),
//!     );
//!     let progress = migrator.initial_progress(false)?;
//!     let progress = migrator.run(&["BOM-PUTZMEISTER".to_string()], progress).await;
//!     println!("{} tasks migrated", progress.stats.tasks_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod migration;
pub mod models;
pub mod network;
pub mod progress;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use config::{FileSettings, MigrationConfig, ModelSelection, Settings, TableNames};
pub use error::{MigrateError, Result, StoreSide};
pub use migration::{migrate_model, MigrationOptions, Migrator, Pipeline};
pub use models::{IntervalRecord, ModelRecord, PartRecord, RecordId, TaskRecord};
pub use network::{retry_async, RestClient, RetryConfig, RetryStats};
pub use progress::{
    dry_run_path, CheckpointStore, FileCheckpoint, MemoryCheckpoint, MigrationProgress,
    ModelOutcome, ModelStats, ModelStatus,
};
pub use report::MigrationReport;
pub use store::{MemoryStore, RecordStore, RestStore};
