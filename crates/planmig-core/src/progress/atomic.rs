//! Atomic file operations for checkpoint persistence.
//!
//! Writes go to a temp file with a PID suffix, are fsynced, and are then
//! renamed over the target, so a reader sees either the old checkpoint or the
//! new one and never a torn file.

use crate::{MigrateError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use tracing::{debug, warn};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MigrateError::io_with_path(e, path)),
    };

    let data: T = serde_json::from_str(&contents).map_err(|e| MigrateError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
///
/// 1. Serializes data to `<path>.<pid>.tmp`
/// 2. Calls fsync so the bytes reach disk
/// 3. Optionally copies the previous file to `.bak`
/// 4. Renames the temp file over the target
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| MigrateError::io_with_path(e, parent))?;
        }
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| MigrateError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| MigrateError::io_with_path(e, &temp_path))?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| MigrateError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| MigrateError::io_with_path(e, &temp_path))?;
    }

    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            // Backup failure is not fatal
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(MigrateError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        });
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        model: String,
        done: u32,
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.json");
        let data = Counter {
            model: "A".into(),
            done: 3,
        };

        atomic_write_json(&path, &data, false).unwrap();
        let read: Option<Counter> = atomic_read_json(&path).unwrap();
        assert_eq!(read, Some(data));
    }

    #[test]
    fn test_overwrite_keeps_backup_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress.json");

        atomic_write_json(&path, &Counter { model: "A".into(), done: 1 }, true).unwrap();
        atomic_write_json(&path, &Counter { model: "A".into(), done: 2 }, true).unwrap();

        let backup: Option<Counter> =
            atomic_read_json(&path.with_extension("json.bak")).unwrap();
        assert_eq!(backup.unwrap().done, 1);
        let current: Option<Counter> = atomic_read_json(&path).unwrap();
        assert_eq!(current.unwrap().done, 2);

        let leftovers = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let result: Option<Counter> =
            atomic_read_json(&temp_dir.path().join("nope.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_corrupt_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(atomic_read_json::<Counter>(&path).is_err());
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("progress.json");
        atomic_write_json(&path, &Counter { model: "B".into(), done: 0 }, false).unwrap();
        assert!(path.exists());
    }
}
