//! Run loop over models with checkpointing.

use super::{
    load_and_match, migrate_parts, migrate_tasks, resolve_model, MigrationOptions, Pipeline,
    Resolution,
};
use crate::error::{MigrateError, Result};
use crate::progress::{CheckpointStore, MigrationProgress, ModelOutcome};
use crate::store::RecordStore;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run every stage for one model.
///
/// Never fails: anything that goes wrong is counted on the returned outcome.
pub async fn migrate_model(pipeline: &Pipeline<'_>, name: &str) -> ModelOutcome {
    let mut outcome = ModelOutcome::default();
    if let Err(e) = run_stages(pipeline, name, &mut outcome).await {
        error!("Migration of '{}' failed: {}", name, e);
        outcome.error(format!("Migration failed: {}", e));
    }
    outcome
}

async fn run_stages(pipeline: &Pipeline<'_>, name: &str, outcome: &mut ModelOutcome) -> Result<()> {
    let model = match resolve_model(pipeline, name).await? {
        Resolution::Resolved(model) => model,
        missing => {
            let err = missing
                .missing_error(name)
                .unwrap_or_else(|| MigrateError::Other(format!("Model '{}' not resolved", name)));
            warn!("{}; skipping", err);
            outcome.skip_reason(err.to_string());
            outcome.error(err.to_string());
            return Ok(());
        }
    };

    let intervals = load_and_match(pipeline, &model).await?;
    for warning in intervals.warnings() {
        warn!("'{}': {}", name, warning);
        outcome.skip_reason(warning);
    }
    if intervals.is_empty() {
        outcome.skip_reason("No matching intervals; nothing to migrate");
        return Ok(());
    }

    let task_map = migrate_tasks(pipeline, &intervals, outcome).await?;
    if task_map.is_empty() {
        return Ok(());
    }

    migrate_parts(pipeline, &task_map, outcome).await
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Drives the pipeline over a list of models, one at a time.
pub struct Migrator {
    source: Arc<dyn RecordStore>,
    destination: Arc<dyn RecordStore>,
    checkpoint: Arc<dyn CheckpointStore>,
    options: MigrationOptions,
}

impl Migrator {
    pub fn new(
        source: Arc<dyn RecordStore>,
        destination: Arc<dyn RecordStore>,
        checkpoint: Arc<dyn CheckpointStore>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            destination,
            checkpoint,
            options,
        }
    }

    /// Starting state: the saved checkpoint when resuming, otherwise fresh.
    pub fn initial_progress(&self, resume: bool) -> Result<MigrationProgress> {
        if !resume {
            return Ok(MigrationProgress::new(self.options.dry_run));
        }
        match self.checkpoint.load()? {
            Some(progress) => {
                info!(
                    "Resuming: {} model(s) already completed",
                    progress.completed_models.len()
                );
                Ok(progress)
            }
            None => {
                info!("No checkpoint found; starting fresh");
                Ok(MigrationProgress::new(self.options.dry_run))
            }
        }
    }

    /// Migrate every model in `models` not already completed in `progress`.
    ///
    /// The checkpoint is saved when a model starts and again when it
    /// finishes. Returns the final state.
    pub async fn run(&self, models: &[String], mut progress: MigrationProgress) -> MigrationProgress {
        let pending: Vec<String> = progress.pending(models).into_iter().cloned().collect();
        let skipped = models.len() - pending.len();
        if skipped > 0 {
            info!("Skipping {} completed model(s)", skipped);
        }

        let pipeline = Pipeline::new(
            self.source.as_ref(),
            self.destination.as_ref(),
            &self.options,
        );

        for (index, name) in pending.iter().enumerate() {
            info!("[{}/{}] Migrating '{}'", index + 1, pending.len(), name);
            progress.begin_model(name);
            self.save(&progress);

            let outcome = match AssertUnwindSafe(migrate_model(&pipeline, name))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Migration of '{}' panicked: {}", name, message);
                    let mut outcome = ModelOutcome::default();
                    outcome.error(format!("Unexpected failure: {}", message));
                    outcome
                }
            };

            if outcome.has_errors() {
                warn!(
                    "'{}' finished with {} error(s); tasks {} migrated, parts {} migrated",
                    name,
                    outcome.stats.errors,
                    outcome.stats.tasks_migrated,
                    outcome.stats.parts_migrated
                );
            } else {
                info!(
                    "'{}': tasks {} found / {} migrated / {} skipped, parts {} migrated",
                    name,
                    outcome.stats.tasks_found,
                    outcome.stats.tasks_migrated,
                    outcome.stats.tasks_skipped,
                    outcome.stats.parts_migrated
                );
            }

            progress.record_outcome(name, outcome);
            self.save(&progress);
        }

        progress
    }

    fn save(&self, progress: &MigrationProgress) {
        if let Err(e) = self.checkpoint.save(progress) {
            error!("Failed to save checkpoint: {}", e);
        }
    }
}
