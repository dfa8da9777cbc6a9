//! Task copy with duplicate detection and keyed reconciliation of inserts.

use super::{IntervalMatch, Pipeline};
use crate::error::Result;
use crate::models::{NewTask, RecordId, TaskKey, TaskRecord};
use crate::progress::ModelOutcome;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Source task ID → destination task ID.
pub type TaskMap = HashMap<RecordId, RecordId>;

/// A source task waiting to be inserted.
#[derive(Debug, Clone)]
struct StagedTask {
    source_id: RecordId,
    row: NewTask,
}

/// Result of matching one inserted batch back to its source tasks.
#[derive(Debug, Default, PartialEq, Eq)]
struct Reconciled {
    resolved: Vec<(RecordId, RecordId)>,
    /// Staged source tasks no inserted row matched.
    unresolved: Vec<RecordId>,
    /// Inserted rows whose key matched no staged task.
    stray_rows: Vec<RecordId>,
}

/// Pair inserted rows with staged tasks by composite key, ignoring order.
fn reconcile(batch: &[StagedTask], inserted: &[TaskRecord]) -> Reconciled {
    let mut by_key: HashMap<TaskKey, &StagedTask> =
        batch.iter().map(|staged| (staged.row.key(), staged)).collect();
    let mut result = Reconciled::default();

    for row in inserted {
        match by_key.remove(&row.key()) {
            Some(staged) => result
                .resolved
                .push((staged.source_id.clone(), row.id.clone())),
            None => result.stray_rows.push(row.id.clone()),
        }
    }

    result.unresolved = by_key
        .into_values()
        .map(|staged| staged.source_id.clone())
        .collect();
    result.unresolved.sort();
    result
}

/// Load tasks for a model's matched source intervals, in ID chunks.
async fn load_source_tasks(pipeline: &Pipeline<'_>, interval_ids: &[RecordId]) -> Result<Vec<TaskRecord>> {
    let source = pipeline.source;
    let mut tasks = Vec::new();
    for chunk in interval_ids.chunks(pipeline.chunk_size()) {
        let rows = pipeline
            .remote(source, "load tasks", move || source.tasks_for_intervals(chunk))
            .await?;
        tasks.extend(rows);
    }
    Ok(tasks)
}

/// Copy tasks under the matched intervals and return the task ID map.
///
/// The map includes tasks resolved to an existing destination duplicate, so
/// their parts still migrate. Batch insert failures are counted on `outcome`
/// and do not stop later batches; read failures after retries propagate.
pub async fn migrate_tasks(
    pipeline: &Pipeline<'_>,
    intervals: &IntervalMatch,
    outcome: &mut ModelOutcome,
) -> Result<TaskMap> {
    let destination = pipeline.destination;
    let tasks = load_source_tasks(pipeline, &intervals.source_ids()).await?;
    outcome.stats.tasks_found += tasks.len() as u64;

    let mut task_map = TaskMap::new();
    let mut staged: Vec<StagedTask> = Vec::new();
    let mut staged_keys: HashMap<TaskKey, RecordId> = HashMap::new();
    // (later source task, first source task with the same key)
    let mut aliases: Vec<(RecordId, RecordId)> = Vec::new();
    let mut unmatched_interval = 0usize;
    let mut duplicates = 0usize;

    for task in &tasks {
        let Some(dest_interval) = intervals.destination_for(&task.interval_id) else {
            debug!("Task {} skipped: interval not matched", task.id);
            unmatched_interval += 1;
            outcome.stats.tasks_skipped += 1;
            continue;
        };

        let row = task.to_new(dest_interval.clone());
        let key = row.key();

        if let Some(first) = staged_keys.get(&key) {
            debug!("Task {} duplicates staged task {}", task.id, first);
            aliases.push((task.id.clone(), first.clone()));
            duplicates += 1;
            outcome.stats.tasks_skipped += 1;
            continue;
        }

        let key_ref = &key;
        let existing = pipeline
            .remote(destination, "find task", move || destination.find_task(key_ref))
            .await?;

        match existing {
            Some(existing) => {
                debug!("Task {} already exists as {}", task.id, existing.id);
                task_map.insert(task.id.clone(), existing.id);
                duplicates += 1;
                outcome.stats.tasks_skipped += 1;
            }
            None => {
                staged_keys.insert(key, task.id.clone());
                staged.push(StagedTask {
                    source_id: task.id.clone(),
                    row,
                });
            }
        }
    }

    if unmatched_interval > 0 {
        outcome.skip_reason(format!(
            "{} task(s) skipped: interval not matched",
            unmatched_interval
        ));
    }
    if duplicates > 0 {
        outcome.skip_reason(format!(
            "{} task(s) already present at destination",
            duplicates
        ));
    }

    let mut unresolved = 0usize;
    for (index, batch) in staged.chunks(pipeline.batch_size()).enumerate() {
        if pipeline.options.dry_run {
            for task in batch {
                task_map.insert(task.source_id.clone(), RecordId::planned(&task.source_id));
            }
            outcome.stats.tasks_migrated += batch.len() as u64;
            debug!("[dry run] Would insert task batch {} ({} tasks)", index + 1, batch.len());
            continue;
        }

        let rows: Vec<NewTask> = batch.iter().map(|staged| staged.row.clone()).collect();
        let rows = rows.as_slice();
        match pipeline
            .remote(destination, "insert tasks", move || destination.insert_tasks(rows))
            .await
        {
            Ok(inserted) => {
                outcome.stats.tasks_migrated += inserted.len() as u64;
                let reconciled = reconcile(batch, &inserted);
                for stray in &reconciled.stray_rows {
                    warn!("Inserted task {} matches no staged source task", stray);
                }
                for source_id in &reconciled.unresolved {
                    warn!(
                        "No inserted row matched source task {}; its parts will not migrate",
                        source_id
                    );
                }
                unresolved += reconciled.unresolved.len();
                task_map.extend(reconciled.resolved);
                debug!("Inserted task batch {} ({} rows)", index + 1, inserted.len());
            }
            Err(e) => {
                error!(
                    "Failed to insert task batch {} ({} tasks): {}",
                    index + 1,
                    batch.len(),
                    e
                );
                outcome.error(format!(
                    "Task batch {} ({} tasks) failed: {}",
                    index + 1,
                    batch.len(),
                    e
                ));
            }
        }
    }

    if unresolved > 0 {
        outcome.skip_reason(format!(
            "{} inserted task(s) could not be matched back; their parts were not migrated",
            unresolved
        ));
    }

    for (alias, first) in aliases {
        if let Some(dest) = task_map.get(&first).cloned() {
            task_map.insert(alias, dest);
        }
    }

    Ok(task_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(source: &str, description: &str) -> StagedTask {
        StagedTask {
            source_id: source.into(),
            row: NewTask {
                interval_id: "d-int".into(),
                description: description.into(),
                task_type: "inspection".into(),
                estimated_time: None,
                requires_specialist: None,
            },
        }
    }

    fn inserted(id: &str, description: &str) -> TaskRecord {
        TaskRecord {
            id: id.into(),
            interval_id: "d-int".into(),
            description: description.into(),
            task_type: "inspection".into(),
            estimated_time: None,
            requires_specialist: None,
        }
    }

    #[test]
    fn test_reconcile_ignores_response_order() {
        let batch = vec![staged("s1", "Check hoses"), staged("s2", "Check pump")];
        let rows = vec![inserted("d2", "Check pump"), inserted("d1", "Check hoses")];

        let mut reconciled = reconcile(&batch, &rows);
        reconciled.resolved.sort();
        assert_eq!(
            reconciled.resolved,
            vec![
                (RecordId::from("s1"), RecordId::from("d1")),
                (RecordId::from("s2"), RecordId::from("d2")),
            ]
        );
        assert!(reconciled.unresolved.is_empty());
        assert!(reconciled.stray_rows.is_empty());
    }

    #[test]
    fn test_reconcile_leaves_missing_rows_unmapped() {
        let batch = vec![staged("s1", "Check hoses"), staged("s2", "Check pump")];
        let rows = vec![inserted("d1", "Check hoses"), inserted("d9", "Altered text")];

        let reconciled = reconcile(&batch, &rows);
        assert_eq!(
            reconciled.resolved,
            vec![(RecordId::from("s1"), RecordId::from("d1"))]
        );
        assert_eq!(reconciled.unresolved, vec![RecordId::from("s2")]);
        assert_eq!(reconciled.stray_rows, vec![RecordId::from("d9")]);
    }
}
