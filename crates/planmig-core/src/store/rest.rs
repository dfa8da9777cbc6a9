//! [`RecordStore`] over a PostgREST table API (Supabase).

use super::RecordStore;
use crate::config::{NetworkConfig, TableNames};
use crate::error::Result;
use crate::models::{
    IntervalRecord, ModelRecord, NewPart, NewTask, PartRecord, RecordId, TaskKey, TaskRecord,
};
use crate::network::RestClient;
use async_trait::async_trait;

/// A store reached through its REST endpoint.
pub struct RestStore {
    client: RestClient,
    tables: TableNames,
}

impl RestStore {
    pub fn new(client: RestClient, tables: TableNames) -> Self {
        Self { client, tables }
    }
}

/// `eq.` filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// `in.(...)` filter value with every element double-quoted.
fn in_list(ids: &[RecordId]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| {
            let escaped = id.as_str().replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        })
        .collect();
    format!("in.({})", quoted.join(","))
}

fn select_all() -> (&'static str, String) {
    ("select", "*".to_string())
}

/// Stable order for paged reads.
fn by_id() -> (&'static str, String) {
    ("order", "id.asc".to_string())
}

#[async_trait]
impl RecordStore for RestStore {
    fn label(&self) -> &str {
        self.client.label()
    }

    async fn find_model(&self, name: &str) -> Result<Option<ModelRecord>> {
        let rows: Vec<ModelRecord> = self
            .client
            .select(
                &self.tables.models,
                &[
                    ("select", "id,name".to_string()),
                    ("name", eq(name)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_intervals(&self, model_id: &RecordId) -> Result<Vec<IntervalRecord>> {
        self.client
            .select_paged(
                &self.tables.intervals,
                &[
                    select_all(),
                    ("model_id", eq(model_id)),
                    ("order", "interval_value.asc,id.asc".to_string()),
                ],
                NetworkConfig::PAGE_SIZE,
            )
            .await
    }

    async fn tasks_for_intervals(&self, interval_ids: &[RecordId]) -> Result<Vec<TaskRecord>> {
        if interval_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .select_paged(
                &self.tables.tasks,
                &[select_all(), ("interval_id", in_list(interval_ids)), by_id()],
                NetworkConfig::PAGE_SIZE,
            )
            .await
    }

    async fn find_task(&self, key: &TaskKey) -> Result<Option<TaskRecord>> {
        let rows: Vec<TaskRecord> = self
            .client
            .select(
                &self.tables.tasks,
                &[
                    select_all(),
                    ("interval_id", eq(&key.interval_id)),
                    ("description", eq(&key.description)),
                    ("type", eq(&key.task_type)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<TaskRecord>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        self.client.insert(&self.tables.tasks, tasks).await
    }

    async fn parts_for_tasks(&self, task_ids: &[RecordId]) -> Result<Vec<PartRecord>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .select_paged(
                &self.tables.parts,
                &[select_all(), ("task_id", in_list(task_ids)), by_id()],
                NetworkConfig::PAGE_SIZE,
            )
            .await
    }

    async fn find_part(&self, task_id: &RecordId, name: &str) -> Result<Option<PartRecord>> {
        let rows: Vec<PartRecord> = self
            .client
            .select(
                &self.tables.parts,
                &[
                    select_all(),
                    ("task_id", eq(task_id)),
                    ("name", eq(name)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_parts(&self, parts: &[NewPart]) -> Result<Vec<PartRecord>> {
        if parts.is_empty() {
            return Ok(Vec::new());
        }
        self.client.insert(&self.tables.parts, parts).await
    }
}
