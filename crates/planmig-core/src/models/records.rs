//! Row types for the four migrated tables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Opaque row identifier.
///
/// Stores may hand out UUID strings or integer keys; both are carried as text
/// and written back in the shape they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

/// Prefix of destination IDs invented for tasks that a dry run would insert.
const PLANNED_PREFIX: &str = "planned:";

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder destination ID for a task staged during a dry run.
    pub fn planned(source: &RecordId) -> Self {
        Self(format!("{}{}", PLANNED_PREFIX, source.0))
    }

    /// Whether this ID was invented by a dry run and never existed remotely.
    pub fn is_planned(&self) -> bool {
        self.0.starts_with(PLANNED_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Integer keys go back out as integers.
        match self.0.parse::<i64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(Number),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(RecordId(s)),
            Raw::Number(n) => Ok(RecordId(n.to_string())),
        }
    }
}

/// An equipment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: RecordId,
    pub name: String,
}

/// A maintenance interval belonging to one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub id: RecordId,
    pub model_id: RecordId,
    /// Hours between services; the cross-store matching key.
    pub interval_value: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl IntervalRecord {
    /// Human-readable label, e.g. `250h (Quarterly service)`.
    pub fn label(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{}h ({})", self.interval_value, name),
            None => format!("{}h", self.interval_value),
        }
    }
}

/// A maintenance task as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: RecordId,
    pub interval_id: RecordId,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default)]
    pub estimated_time: Option<Number>,
    #[serde(default)]
    pub requires_specialist: Option<bool>,
}

impl TaskRecord {
    /// Composite identity of this task under its own interval.
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.interval_id.clone(), &self.description, &self.task_type)
    }

    /// Copy of this task re-parented under a destination interval.
    pub fn to_new(&self, interval_id: RecordId) -> NewTask {
        NewTask {
            interval_id,
            description: self.description.clone(),
            task_type: self.task_type.clone(),
            estimated_time: self.estimated_time.clone(),
            requires_specialist: self.requires_specialist,
        }
    }
}

/// A task row to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub interval_id: RecordId,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub estimated_time: Option<Number>,
    pub requires_specialist: Option<bool>,
}

impl NewTask {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.interval_id.clone(), &self.description, &self.task_type)
    }
}

/// Cross-store identity of a task: (interval, description, type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub interval_id: RecordId,
    pub description: String,
    pub task_type: String,
}

impl TaskKey {
    pub fn new(interval_id: RecordId, description: &str, task_type: &str) -> Self {
        Self {
            interval_id,
            description: description.to_string(),
            task_type: task_type.to_string(),
        }
    }
}

/// A part used by one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub id: RecordId,
    pub task_id: RecordId,
    pub name: String,
    #[serde(default)]
    pub part_number: Option<String>,
    pub quantity: Number,
    #[serde(default)]
    pub cost: Option<Number>,
}

impl PartRecord {
    /// Copy of this part re-parented under a destination task.
    pub fn to_new(&self, task_id: RecordId) -> NewPart {
        NewPart {
            task_id,
            name: self.name.clone(),
            part_number: self.part_number.clone(),
            quantity: self.quantity.clone(),
            cost: self.cost.clone(),
        }
    }
}

/// A part row to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPart {
    pub task_id: RecordId,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: Number,
    pub cost: Option<Number>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_strings_and_integers() {
        let uuid: RecordId = serde_json::from_value(json!("7b9c2f3e-1111")).unwrap();
        let int: RecordId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(uuid.as_str(), "7b9c2f3e-1111");
        assert_eq!(int.as_str(), "42");
        assert_eq!(serde_json::to_value(&int).unwrap(), json!(42));
        assert_eq!(serde_json::to_value(&uuid).unwrap(), json!("7b9c2f3e-1111"));
    }

    #[test]
    fn test_planned_ids() {
        let id = RecordId::planned(&RecordId::new("t1"));
        assert!(id.is_planned());
        assert!(!RecordId::new("t1").is_planned());
    }

    #[test]
    fn test_task_row_uses_type_column() {
        let task: TaskRecord = serde_json::from_value(json!({
            "id": 7,
            "interval_id": 3,
            "description": "Grease boom pivots",
            "type": "lubrication",
            "estimated_time": 30,
            "requires_specialist": null,
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(task.task_type, "lubrication");

        let new = task.to_new(RecordId::new("99"));
        let value = serde_json::to_value(&new).unwrap();
        assert_eq!(value["interval_id"], json!(99));
        assert_eq!(value["type"], json!("lubrication"));
        // integer columns stay integers
        assert_eq!(value["estimated_time"], json!(30));
    }

    #[test]
    fn test_interval_label() {
        let interval = IntervalRecord {
            id: "i1".into(),
            model_id: "m1".into(),
            interval_value: 250.0,
            name: Some("Quarterly".into()),
        };
        assert_eq!(interval.label(), "250h (Quarterly)");
    }
}
