//! Run progress: per-model statistics, the completed-model list, and the
//! durable checkpoint that makes a run resumable.
//!
//! [`MigrationProgress`] is a plain value owned by the run loop. Pipeline
//! stages never see it; each model's work produces a [`ModelOutcome`] that the
//! loop folds in with [`MigrationProgress::record_outcome`] before saving
//! through a [`CheckpointStore`].

mod atomic;
mod checkpoint;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use checkpoint::{dry_run_path, CheckpointStore, FileCheckpoint, MemoryCheckpoint};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelStats {
    pub tasks_found: u64,
    pub tasks_migrated: u64,
    pub tasks_skipped: u64,
    pub parts_found: u64,
    pub parts_migrated: u64,
    pub parts_skipped: u64,
    pub errors: u64,
    /// Human-readable reasons for anything not migrated, warnings included.
    pub skip_reasons: Vec<String>,
}

/// Counters summed over every recorded model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunTotals {
    pub models_processed: u64,
    pub tasks_found: u64,
    pub tasks_migrated: u64,
    pub tasks_skipped: u64,
    pub parts_found: u64,
    pub parts_migrated: u64,
    pub parts_skipped: u64,
    pub errors: u64,
}

impl RunTotals {
    fn add(&mut self, stats: &ModelStats) {
        self.models_processed += 1;
        self.tasks_found += stats.tasks_found;
        self.tasks_migrated += stats.tasks_migrated;
        self.tasks_skipped += stats.tasks_skipped;
        self.parts_found += stats.parts_found;
        self.parts_migrated += stats.parts_migrated;
        self.parts_skipped += stats.parts_skipped;
        self.errors += stats.errors;
    }
}

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub model: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// What one model's migration produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOutcome {
    pub stats: ModelStats,
    /// Error messages, one per increment of `stats.errors`.
    pub errors: Vec<String>,
}

impl ModelOutcome {
    /// Count an error and keep its message for the error log.
    pub fn error(&mut self, message: impl Into<String>) {
        self.stats.errors += 1;
        self.errors.push(message.into());
    }

    /// Record a reason for something not being migrated.
    pub fn skip_reason(&mut self, reason: impl Into<String>) {
        self.stats.skip_reasons.push(reason.into());
    }

    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }
}

/// Where a model stands in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Completed,
    InProgress,
    Pending,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Completed => "Completed",
            ModelStatus::InProgress => "In Progress",
            ModelStatus::Pending => "Pending",
        }
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable state of a migration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    /// Models already processed, successfully or not, in processing order.
    pub completed_models: Vec<String>,
    /// Model being processed when the checkpoint was written.
    #[serde(default)]
    pub current_model: Option<String>,
    #[serde(default)]
    pub stats: RunTotals,
    #[serde(default)]
    pub model_stats: BTreeMap<String, ModelStats>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl MigrationProgress {
    /// Fresh state for a new run.
    pub fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            completed_models: Vec::new(),
            current_model: None,
            stats: RunTotals::default(),
            model_stats: BTreeMap::new(),
            errors: Vec::new(),
            dry_run,
            started_at: now,
            last_updated: now,
        }
    }

    pub fn is_completed(&self, model: &str) -> bool {
        self.completed_models.iter().any(|m| m == model)
    }

    /// Models from `models` that have not been completed, in order.
    pub fn pending<'a>(&self, models: &'a [String]) -> Vec<&'a String> {
        models.iter().filter(|m| !self.is_completed(m)).collect()
    }

    /// Mark a model as in flight.
    pub fn begin_model(&mut self, model: &str) {
        self.current_model = Some(model.to_string());
        self.last_updated = Utc::now();
    }

    /// Fold a finished model into the state.
    ///
    /// The model is appended to the completed list whether or not it had
    /// errors; a resumed run does not retry it.
    pub fn record_outcome(&mut self, model: &str, outcome: ModelOutcome) {
        let now = Utc::now();
        for error in outcome.errors {
            self.errors.push(ErrorRecord {
                model: model.to_string(),
                error,
                timestamp: now,
            });
        }
        self.model_stats.insert(model.to_string(), outcome.stats);
        if !self.is_completed(model) {
            self.completed_models.push(model.to_string());
        }
        if self.current_model.as_deref() == Some(model) {
            self.current_model = None;
        }
        self.recompute_totals();
        self.last_updated = now;
    }

    pub fn status_of(&self, model: &str) -> ModelStatus {
        if self.is_completed(model) {
            ModelStatus::Completed
        } else if self.current_model.as_deref() == Some(model) {
            ModelStatus::InProgress
        } else {
            ModelStatus::Pending
        }
    }

    fn recompute_totals(&mut self) {
        let mut totals = RunTotals::default();
        for stats in self.model_stats.values() {
            totals.add(stats);
        }
        self.stats = totals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(migrated: u64, errors: &[&str]) -> ModelOutcome {
        let mut outcome = ModelOutcome::default();
        outcome.stats.tasks_found = migrated;
        outcome.stats.tasks_migrated = migrated;
        for e in errors {
            outcome.error(*e);
        }
        outcome
    }

    #[test]
    fn test_record_outcome_updates_totals_and_lists() {
        let mut progress = MigrationProgress::new(false);
        progress.begin_model("A");
        assert_eq!(progress.status_of("A"), ModelStatus::InProgress);

        progress.record_outcome("A", outcome(5, &[]));
        progress.begin_model("B");
        progress.record_outcome("B", outcome(0, &["Model 'B' not found in destination"]));

        assert_eq!(progress.completed_models, vec!["A", "B"]);
        assert_eq!(progress.current_model, None);
        assert_eq!(progress.stats.models_processed, 2);
        assert_eq!(progress.stats.tasks_migrated, 5);
        assert_eq!(progress.stats.errors, 1);
        assert_eq!(progress.errors.len(), 1);
        assert_eq!(progress.errors[0].model, "B");
        assert_eq!(progress.status_of("B"), ModelStatus::Completed);
        assert_eq!(progress.status_of("C"), ModelStatus::Pending);
    }

    #[test]
    fn test_recording_twice_does_not_double_count() {
        let mut progress = MigrationProgress::new(false);
        progress.record_outcome("A", outcome(5, &[]));
        progress.record_outcome("A", outcome(0, &[]));
        assert_eq!(progress.completed_models, vec!["A"]);
        assert_eq!(progress.stats.tasks_migrated, 0);
        assert_eq!(progress.stats.models_processed, 1);
    }

    #[test]
    fn test_pending_subtracts_completed() {
        let mut progress = MigrationProgress::new(false);
        progress.record_outcome("B", outcome(1, &[]));
        let models: Vec<String> = vec!["A".into(), "B".into(), "C".into()];
        let pending: Vec<&str> = progress.pending(&models).into_iter().map(|s| s.as_str()).collect();
        assert_eq!(pending, vec!["A", "C"]);
    }

    #[test]
    fn test_checkpoint_json_uses_camel_case() {
        let mut progress = MigrationProgress::new(false);
        progress.record_outcome("A", outcome(2, &[]));
        let value = serde_json::to_value(&progress).unwrap();
        assert!(value.get("completedModels").is_some());
        assert!(value.get("lastUpdated").is_some());
        assert_eq!(value["modelStats"]["A"]["tasksMigrated"], 2);
        assert!(value["modelStats"]["A"]["skipReasons"].is_array());
    }
}
