//! The per-model migration pipeline.
//!
//! Stages run strictly in sequence for one model:
//! 1. [`resolve_model`] finds the model on both stores
//! 2. [`load_and_match`] aligns intervals by `interval_value`
//! 3. [`migrate_tasks`] copies tasks and builds the task ID map
//! 4. [`migrate_parts`] copies parts of every mapped task
//!
//! [`Migrator`] drives the stages over a list of models and owns the
//! checkpoint.

mod intervals;
mod parts;
mod resolver;
mod runner;
mod tasks;

pub use intervals::{load_and_match, match_intervals, IntervalMatch};
pub use parts::migrate_parts;
pub use resolver::{resolve_model, Resolution, ResolvedModel};
pub use runner::{migrate_model, Migrator};
pub use tasks::{migrate_tasks, TaskMap};

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::network::{retry_async, RetryConfig};
use crate::store::RecordStore;
use std::future::Future;
use tracing::debug;

/// Knobs shared by every stage.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Count what would be written without writing anything.
    pub dry_run: bool,
    /// Rows per insert request.
    pub batch_size: usize,
    /// IDs per multi-get request.
    pub id_chunk_size: usize,
    pub retry: RetryConfig,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: MigrationConfig::BATCH_SIZE,
            id_chunk_size: MigrationConfig::ID_CHUNK_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

/// Both stores plus options, borrowed for the duration of one model.
#[derive(Clone, Copy)]
pub struct Pipeline<'a> {
    pub source: &'a dyn RecordStore,
    pub destination: &'a dyn RecordStore,
    pub options: &'a MigrationOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn RecordStore,
        destination: &'a dyn RecordStore,
        options: &'a MigrationOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Run one call against `store` under the retry policy.
    pub(crate) async fn remote<T, F, Fut>(
        &self,
        store: &dyn RecordStore,
        action: &str,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let label = call_label(store, action);
        let (result, stats) = retry_async(&self.options.retry, &label, operation).await;
        if stats.attempts > 1 && stats.success {
            debug!(
                "{} recovered after {} attempts ({:?} backoff)",
                label,
                stats.attempts,
                stats.total_delay()
            );
        }
        result
    }

    fn chunk_size(&self) -> usize {
        self.options.id_chunk_size.max(1)
    }

    fn batch_size(&self) -> usize {
        self.options.batch_size.max(1)
    }
}

/// Log prefix for a call, e.g. `[destination] insert tasks`.
fn call_label(store: &dyn RecordStore, action: &str) -> String {
    format!("[{}] {}", store.label(), action)
}
