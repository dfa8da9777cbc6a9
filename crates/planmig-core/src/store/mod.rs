//! Remote record stores.
//!
//! [`RecordStore`] is the only contract the pipeline has with a backend:
//! exact-match point queries, multi-gets by a set of parent IDs, and batch
//! inserts that return the inserted rows. Multi-get callers must keep each ID
//! slice within [`MigrationConfig::ID_CHUNK_SIZE`](crate::config::MigrationConfig::ID_CHUNK_SIZE).

mod memory;
mod rest;

pub use memory::{MemoryStore, StoreCalls, StoreOp};
pub use rest::RestStore;

use crate::error::Result;
use crate::models::{
    IntervalRecord, ModelRecord, NewPart, NewTask, PartRecord, RecordId, TaskKey, TaskRecord,
};
use async_trait::async_trait;

/// Read/write access to the four migrated tables of one store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store name for log lines ("source", "destination").
    fn label(&self) -> &str;

    /// Look up a model by exact, case-sensitive name.
    async fn find_model(&self, name: &str) -> Result<Option<ModelRecord>>;

    /// All intervals of one model, in store order.
    async fn list_intervals(&self, model_id: &RecordId) -> Result<Vec<IntervalRecord>>;

    /// Tasks belonging to any of the given intervals.
    async fn tasks_for_intervals(&self, interval_ids: &[RecordId]) -> Result<Vec<TaskRecord>>;

    /// A task matching the composite key, if one exists.
    async fn find_task(&self, key: &TaskKey) -> Result<Option<TaskRecord>>;

    /// Insert a batch of tasks. Rows may come back in any order.
    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<TaskRecord>>;

    /// Parts belonging to any of the given tasks.
    async fn parts_for_tasks(&self, task_ids: &[RecordId]) -> Result<Vec<PartRecord>>;

    /// A part with this name under the given task, if one exists.
    async fn find_part(&self, task_id: &RecordId, name: &str) -> Result<Option<PartRecord>>;

    /// Insert a batch of parts.
    async fn insert_parts(&self, parts: &[NewPart]) -> Result<Vec<PartRecord>>;
}
