//! Tabular run report built from the final progress state.

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::progress::{ErrorRecord, MigrationProgress, ModelStatus, RunTotals};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub model: String,
    pub tasks_found: u64,
    pub tasks_migrated: u64,
    pub tasks_skipped: u64,
    pub parts_migrated: u64,
    pub errors: u64,
    pub status: ModelStatus,
}

/// Everything the report shows.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub rows: Vec<ReportRow>,
    pub totals: RunTotals,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub errors: Vec<ErrorRecord>,
}

impl MigrationReport {
    /// One row per configured model, in configured order.
    pub fn build(progress: &MigrationProgress, models: &[String], generated_at: DateTime<Utc>) -> Self {
        let rows = models
            .iter()
            .map(|model| {
                let stats = progress.model_stats.get(model).cloned().unwrap_or_default();
                ReportRow {
                    model: model.clone(),
                    tasks_found: stats.tasks_found,
                    tasks_migrated: stats.tasks_migrated,
                    tasks_skipped: stats.tasks_skipped,
                    parts_migrated: stats.parts_migrated,
                    errors: stats.errors,
                    status: progress.status_of(model),
                }
            })
            .collect();

        Self {
            generated_at,
            dry_run: progress.dry_run,
            rows,
            totals: progress.stats.clone(),
            started_at: progress.started_at,
            last_updated: progress.last_updated,
            errors: progress.errors.clone(),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == ModelStatus::Completed)
            .count()
    }

    /// Report file name, e.g. `migration-report-20240301-141500.md`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.md",
            MigrationConfig::REPORT_PREFIX,
            self.generated_at.format("%Y%m%d-%H%M%S")
        )
    }

    /// Short summary for the log.
    pub fn summary_lines(&self) -> Vec<String> {
        let duration = self.last_updated - self.started_at;
        vec![
            format!("Mode: {}", if self.dry_run { "DRY RUN" } else { "LIVE" }),
            format!(
                "Models completed: {}/{}",
                self.completed_count(),
                self.rows.len()
            ),
            format!(
                "Tasks: {} found, {} migrated, {} skipped",
                self.totals.tasks_found, self.totals.tasks_migrated, self.totals.tasks_skipped
            ),
            format!(
                "Parts: {} found, {} migrated, {} skipped",
                self.totals.parts_found, self.totals.parts_migrated, self.totals.parts_skipped
            ),
            format!("Errors: {}", self.totals.errors),
            format!("Duration: {}s", duration.num_seconds().max(0)),
        ]
    }

    /// Markdown table, summary block, and error log.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Maintenance Plan Migration Report");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "| Model | Tasks Found | Tasks Migrated | Tasks Skipped | Parts Migrated | Errors | Status |"
        );
        let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---|");
        for row in &self.rows {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} |",
                row.model,
                row.tasks_found,
                row.tasks_migrated,
                row.tasks_skipped,
                row.parts_migrated,
                row.errors,
                row.status
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out);
        for line in self.summary_lines() {
            let _ = writeln!(out, "- {}", line);
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Errors");
            let _ = writeln!(out);
            for record in &self.errors {
                let _ = writeln!(
                    out,
                    "- {} [{}]: {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.model,
                    record.error
                );
            }
        }

        out
    }

    /// Write the rendered report into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| MigrateError::io_with_path(e, dir))?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render()).map_err(|e| MigrateError::io_with_path(e, &path))?;
        Ok(path)
    }
}
