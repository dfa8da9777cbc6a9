//! Data models for the migrated record tree: model → interval → task → part.

mod records;

pub use records::{
    IntervalRecord, ModelRecord, NewPart, NewTask, PartRecord, RecordId, TaskKey, TaskRecord,
};
