//! Part copy for every mapped task.

use super::{Pipeline, TaskMap};
use crate::error::Result;
use crate::models::{NewPart, PartRecord, RecordId};
use crate::progress::ModelOutcome;
use std::collections::HashSet;
use tracing::{debug, error};

async fn load_source_parts(pipeline: &Pipeline<'_>, task_ids: &[RecordId]) -> Result<Vec<PartRecord>> {
    let source = pipeline.source;
    let mut parts = Vec::new();
    for chunk in task_ids.chunks(pipeline.chunk_size()) {
        let rows = pipeline
            .remote(source, "load parts", move || source.parts_for_tasks(chunk))
            .await?;
        parts.extend(rows);
    }
    Ok(parts)
}

/// Copy the parts of every task in `task_map` to its destination task.
///
/// Parts are unique per (destination task, name): repeats within the source
/// and parts already present at the destination are skipped. Outside a dry
/// run each part is checked against the destination individually.
pub async fn migrate_parts(
    pipeline: &Pipeline<'_>,
    task_map: &TaskMap,
    outcome: &mut ModelOutcome,
) -> Result<()> {
    let destination = pipeline.destination;
    let dry_run = pipeline.options.dry_run;

    let mut source_task_ids: Vec<RecordId> = task_map.keys().cloned().collect();
    source_task_ids.sort();
    let parts = load_source_parts(pipeline, &source_task_ids).await?;
    outcome.stats.parts_found += parts.len() as u64;

    let mut seen: HashSet<(RecordId, String)> = HashSet::new();
    let mut staged: Vec<NewPart> = Vec::new();
    let mut unmapped = 0usize;
    let mut duplicates = 0usize;

    for part in &parts {
        let Some(dest_task) = task_map.get(&part.task_id) else {
            unmapped += 1;
            outcome.stats.parts_skipped += 1;
            continue;
        };

        if !seen.insert((dest_task.clone(), part.name.clone())) {
            debug!("Part '{}' repeated under task {}", part.name, part.task_id);
            duplicates += 1;
            outcome.stats.parts_skipped += 1;
            continue;
        }

        if !dry_run && !dest_task.is_planned() {
            let name = part.name.as_str();
            let existing = pipeline
                .remote(destination, "find part", move || {
                    destination.find_part(dest_task, name)
                })
                .await?;
            if existing.is_some() {
                debug!("Part '{}' already exists under task {}", part.name, dest_task);
                duplicates += 1;
                outcome.stats.parts_skipped += 1;
                continue;
            }
        }

        staged.push(part.to_new(dest_task.clone()));
    }

    if unmapped > 0 {
        outcome.skip_reason(format!(
            "{} part(s) skipped: task not migrated",
            unmapped
        ));
    }
    if duplicates > 0 {
        outcome.skip_reason(format!(
            "{} part(s) already present at destination",
            duplicates
        ));
    }

    for (index, batch) in staged.chunks(pipeline.batch_size()).enumerate() {
        if dry_run {
            outcome.stats.parts_migrated += batch.len() as u64;
            debug!("[dry run] Would insert part batch {} ({} parts)", index + 1, batch.len());
            continue;
        }

        match pipeline
            .remote(destination, "insert parts", move || destination.insert_parts(batch))
            .await
        {
            Ok(inserted) => {
                outcome.stats.parts_migrated += inserted.len() as u64;
                debug!("Inserted part batch {} ({} rows)", index + 1, inserted.len());
            }
            Err(e) => {
                error!(
                    "Failed to insert part batch {} ({} parts): {}",
                    index + 1,
                    batch.len(),
                    e
                );
                outcome.error(format!(
                    "Part batch {} ({} parts) failed: {}",
                    index + 1,
                    batch.len(),
                    e
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationOptions;
    use crate::store::{MemoryStore, StoreOp};

    fn map(pairs: &[(&RecordId, &RecordId)]) -> TaskMap {
        pairs
            .iter()
            .map(|(s, d)| ((*s).clone(), (*d).clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_parts_follow_task_map() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        let s_task = source.add_task(&"s-int".into(), "Replace filter", "replacement");
        source.add_part(&s_task, "Oil filter", 1);
        source.add_part(&s_task, "Gasket", 2);
        let d_task = dest.add_task(&"d-int".into(), "Replace filter", "replacement");
        dest.add_part(&d_task, "Gasket", 2);

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);
        let mut outcome = ModelOutcome::default();
        migrate_parts(&pipeline, &map(&[(&s_task, &d_task)]), &mut outcome)
            .await
            .unwrap();

        assert_eq!(outcome.stats.parts_found, 2);
        assert_eq!(outcome.stats.parts_migrated, 1);
        assert_eq!(outcome.stats.parts_skipped, 1);
        let names: Vec<String> = dest
            .parts()
            .into_iter()
            .filter(|p| p.task_id == d_task)
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Gasket".to_string(), "Oil filter".to_string()]);
    }

    #[tokio::test]
    async fn test_source_repeats_collapse_per_destination_task() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        let a = source.add_task(&"s-int".into(), "Check", "inspection");
        let b = source.add_task(&"s-int".into(), "Check", "inspection");
        source.add_part(&a, "Seal kit", 1);
        source.add_part(&b, "Seal kit", 1);
        let target: RecordId = "d-task".into();

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);
        let mut outcome = ModelOutcome::default();
        migrate_parts(&pipeline, &map(&[(&a, &target), (&b, &target)]), &mut outcome)
            .await
            .unwrap();

        assert_eq!(outcome.stats.parts_migrated, 1);
        assert_eq!(outcome.stats.parts_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_counted_and_later_batches_run() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        let task = source.add_task(&"s-int".into(), "Service", "service");
        for i in 0..5 {
            source.add_part(&task, &format!("Part {}", i), 1);
        }
        // every attempt of the first batch fails
        dest.fail_next(StoreOp::InsertParts, 3);

        let options = MigrationOptions {
            batch_size: 2,
            ..Default::default()
        };
        let pipeline = Pipeline::new(&source, &dest, &options);
        let mut outcome = ModelOutcome::default();
        migrate_parts(&pipeline, &map(&[(&task, &"d-task".into())]), &mut outcome)
            .await
            .unwrap();

        assert_eq!(outcome.stats.errors, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("2 parts"));
        assert_eq!(outcome.stats.parts_migrated, 3);
        assert_eq!(dest.calls().insert_parts, vec![2, 2, 2, 2, 1]);
    }

    #[tokio::test]
    async fn test_part_lookups_are_chunked() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        let mut task_map = TaskMap::new();
        for i in 0..250 {
            task_map.insert(RecordId::new(format!("s{}", i)), RecordId::new(format!("d{}", i)));
        }

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);
        let mut outcome = ModelOutcome::default();
        migrate_parts(&pipeline, &task_map, &mut outcome).await.unwrap();

        assert_eq!(source.calls().parts_for_tasks, vec![100, 100, 50]);
    }
}
