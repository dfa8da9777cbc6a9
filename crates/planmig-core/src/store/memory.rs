//! In-process [`RecordStore`] for rehearsals and tests.
//!
//! Records every call (with the size of each multi-get and insert), can be
//! told to fail the next N calls of an operation, and can hand inserted rows
//! back in reverse order to mimic a backend that does not preserve request
//! order.

use super::RecordStore;
use crate::error::{MigrateError, Result};
use crate::models::{
    IntervalRecord, ModelRecord, NewPart, NewTask, PartRecord, RecordId, TaskKey, TaskRecord,
};
use async_trait::async_trait;
use serde_json::Number;
use std::collections::HashMap;
use std::sync::Mutex;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindModel,
    ListIntervals,
    TasksForIntervals,
    FindTask,
    InsertTasks,
    PartsForTasks,
    FindPart,
    InsertParts,
}

/// Calls observed by a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub find_model: Vec<String>,
    pub list_intervals: usize,
    /// ID count of each task multi-get.
    pub tasks_for_intervals: Vec<usize>,
    pub find_task: usize,
    /// Row count of each task insert (including failed ones).
    pub insert_tasks: Vec<usize>,
    /// ID count of each part multi-get.
    pub parts_for_tasks: Vec<usize>,
    pub find_part: usize,
    pub insert_parts: Vec<usize>,
}

impl StoreCalls {
    /// Total number of calls of any kind.
    pub fn total(&self) -> usize {
        self.find_model.len()
            + self.list_intervals
            + self.tasks_for_intervals.len()
            + self.find_task
            + self.insert_tasks.len()
            + self.parts_for_tasks.len()
            + self.find_part
            + self.insert_parts.len()
    }
}

#[derive(Default)]
struct Tables {
    models: Vec<ModelRecord>,
    intervals: Vec<IntervalRecord>,
    tasks: Vec<TaskRecord>,
    parts: Vec<PartRecord>,
    next_id: u64,
    calls: StoreCalls,
    failures: HashMap<StoreOp, u32>,
    reverse_inserts: bool,
}

impl Tables {
    fn next_id(&mut self, prefix: &str) -> RecordId {
        self.next_id += 1;
        RecordId::new(format!("{}-{}", prefix, self.next_id))
    }

    fn take_failure(&mut self, op: StoreOp, label: &str) -> Result<()> {
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(MigrateError::Network {
                    message: format!("[{}] injected failure for {:?}", label, op),
                    cause: None,
                })
            }
            _ => Ok(()),
        }
    }
}

/// A store held entirely in memory.
pub struct MemoryStore {
    label: String,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a model and return its ID.
    pub fn add_model(&self, name: &str) -> RecordId {
        let mut tables = self.lock();
        let id = tables.next_id(&self.label);
        tables.models.push(ModelRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Seed an interval and return its ID.
    pub fn add_interval(&self, model_id: &RecordId, value: f64, name: &str) -> RecordId {
        let mut tables = self.lock();
        let id = tables.next_id(&self.label);
        tables.intervals.push(IntervalRecord {
            id: id.clone(),
            model_id: model_id.clone(),
            interval_value: value,
            name: Some(name.to_string()),
        });
        id
    }

    /// Seed a task and return its ID.
    pub fn add_task(&self, interval_id: &RecordId, description: &str, task_type: &str) -> RecordId {
        let mut tables = self.lock();
        let id = tables.next_id(&self.label);
        tables.tasks.push(TaskRecord {
            id: id.clone(),
            interval_id: interval_id.clone(),
            description: description.to_string(),
            task_type: task_type.to_string(),
            estimated_time: Some(Number::from(30)),
            requires_specialist: Some(false),
        });
        id
    }

    /// Seed a part and return its ID.
    pub fn add_part(&self, task_id: &RecordId, name: &str, quantity: u64) -> RecordId {
        let mut tables = self.lock();
        let id = tables.next_id(&self.label);
        tables.parts.push(PartRecord {
            id: id.clone(),
            task_id: task_id.clone(),
            name: name.to_string(),
            part_number: None,
            quantity: Number::from(quantity),
            cost: None,
        });
        id
    }

    /// Make the next `count` calls of `op` fail with a network error.
    pub fn fail_next(&self, op: StoreOp, count: u32) {
        self.lock().failures.insert(op, count);
    }

    /// Return inserted rows in reverse request order.
    pub fn reverse_inserts(&self, reverse: bool) {
        self.lock().reverse_inserts = reverse;
    }

    pub fn calls(&self) -> StoreCalls {
        self.lock().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.lock().calls = StoreCalls::default();
    }

    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.lock().tasks.clone()
    }

    pub fn parts(&self) -> Vec<PartRecord> {
        self.lock().parts.clone()
    }

    /// Row counts as (models, intervals, tasks, parts).
    pub fn row_counts(&self) -> (usize, usize, usize, usize) {
        let tables = self.lock();
        (
            tables.models.len(),
            tables.intervals.len(),
            tables.tasks.len(),
            tables.parts.len(),
        )
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn label(&self) -> &str {
        &self.label
    }

    async fn find_model(&self, name: &str) -> Result<Option<ModelRecord>> {
        let mut tables = self.lock();
        tables.calls.find_model.push(name.to_string());
        tables.take_failure(StoreOp::FindModel, &self.label)?;
        Ok(tables.models.iter().find(|m| m.name == name).cloned())
    }

    async fn list_intervals(&self, model_id: &RecordId) -> Result<Vec<IntervalRecord>> {
        let mut tables = self.lock();
        tables.calls.list_intervals += 1;
        tables.take_failure(StoreOp::ListIntervals, &self.label)?;
        Ok(tables
            .intervals
            .iter()
            .filter(|i| &i.model_id == model_id)
            .cloned()
            .collect())
    }

    async fn tasks_for_intervals(&self, interval_ids: &[RecordId]) -> Result<Vec<TaskRecord>> {
        let mut tables = self.lock();
        tables.calls.tasks_for_intervals.push(interval_ids.len());
        tables.take_failure(StoreOp::TasksForIntervals, &self.label)?;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| interval_ids.contains(&t.interval_id))
            .cloned()
            .collect())
    }

    async fn find_task(&self, key: &TaskKey) -> Result<Option<TaskRecord>> {
        let mut tables = self.lock();
        tables.calls.find_task += 1;
        tables.take_failure(StoreOp::FindTask, &self.label)?;
        Ok(tables.tasks.iter().find(|t| &t.key() == key).cloned())
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<TaskRecord>> {
        let mut tables = self.lock();
        tables.calls.insert_tasks.push(tasks.len());
        tables.take_failure(StoreOp::InsertTasks, &self.label)?;

        let mut inserted = Vec::with_capacity(tasks.len());
        for task in tasks {
            let row = TaskRecord {
                id: tables.next_id(&self.label),
                interval_id: task.interval_id.clone(),
                description: task.description.clone(),
                task_type: task.task_type.clone(),
                estimated_time: task.estimated_time.clone(),
                requires_specialist: task.requires_specialist,
            };
            tables.tasks.push(row.clone());
            inserted.push(row);
        }
        if tables.reverse_inserts {
            inserted.reverse();
        }
        Ok(inserted)
    }

    async fn parts_for_tasks(&self, task_ids: &[RecordId]) -> Result<Vec<PartRecord>> {
        let mut tables = self.lock();
        tables.calls.parts_for_tasks.push(task_ids.len());
        tables.take_failure(StoreOp::PartsForTasks, &self.label)?;
        Ok(tables
            .parts
            .iter()
            .filter(|p| task_ids.contains(&p.task_id))
            .cloned()
            .collect())
    }

    async fn find_part(&self, task_id: &RecordId, name: &str) -> Result<Option<PartRecord>> {
        let mut tables = self.lock();
        tables.calls.find_part += 1;
        tables.take_failure(StoreOp::FindPart, &self.label)?;
        Ok(tables
            .parts
            .iter()
            .find(|p| &p.task_id == task_id && p.name == name)
            .cloned())
    }

    async fn insert_parts(&self, parts: &[NewPart]) -> Result<Vec<PartRecord>> {
        let mut tables = self.lock();
        tables.calls.insert_parts.push(parts.len());
        tables.take_failure(StoreOp::InsertParts, &self.label)?;

        let mut inserted = Vec::with_capacity(parts.len());
        for part in parts {
            let row = PartRecord {
                id: tables.next_id(&self.label),
                task_id: part.task_id.clone(),
                name: part.name.clone(),
                part_number: part.part_number.clone(),
                quantity: part.quantity.clone(),
                cost: part.cost.clone(),
            };
            tables.parts.push(row.clone());
            inserted.push(row);
        }
        if tables.reverse_inserts {
            inserted.reverse();
        }
        Ok(inserted)
    }
}
