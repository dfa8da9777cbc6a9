//! Load/save interface for the durable checkpoint.

use super::atomic::{atomic_read_json, atomic_write_json};
use super::MigrationProgress;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Durable storage for [`MigrationProgress`].
pub trait CheckpointStore: Send + Sync {
    /// Read the last saved state. A missing checkpoint is `Ok(None)`.
    fn load(&self) -> Result<Option<MigrationProgress>>;

    /// Replace the saved state.
    fn save(&self, progress: &MigrationProgress) -> Result<()>;
}

/// Checkpoint kept in a JSON file, rewritten atomically.
pub struct FileCheckpoint {
    path: PathBuf,
    keep_backup: bool,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: true,
        }
    }

    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> Result<Option<MigrationProgress>> {
        atomic_read_json(&self.path)
    }

    fn save(&self, progress: &MigrationProgress) -> Result<()> {
        atomic_write_json(&self.path, progress, self.keep_backup)?;
        debug!(
            "Checkpoint saved to {} ({} completed)",
            self.path.display(),
            progress.completed_models.len()
        );
        Ok(())
    }
}

/// Checkpoint kept in memory; counts saves.
#[derive(Default)]
pub struct MemoryCheckpoint {
    state: Mutex<(Option<MigrationProgress>, usize)>,
}

impl MemoryCheckpoint {
    pub fn new(initial: Option<MigrationProgress>) -> Self {
        Self {
            state: Mutex::new((initial, 0)),
        }
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.1).unwrap_or_default()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<MigrationProgress>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.0.clone())
    }

    fn save(&self, progress: &MigrationProgress) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.0 = Some(progress.clone());
        state.1 += 1;
        Ok(())
    }
}

/// Checkpoint path used by dry runs: `progress.json` → `progress.dry-run.json`.
pub fn dry_run_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "migration-progress".to_string());
    path.with_file_name(format!("{}.dry-run.json", stem))
}
