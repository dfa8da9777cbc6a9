//! Model lookup on both stores.

use super::Pipeline;
use crate::error::{MigrateError, Result, StoreSide};
use crate::models::RecordId;
use tracing::debug;

/// A model present on both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub source_id: RecordId,
    pub destination_id: RecordId,
}

/// Outcome of looking a model up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedModel),
    /// Absent from this store (destination is checked first).
    Missing(StoreSide),
}

impl Resolution {
    /// The not-found error for a missing model.
    pub fn missing_error(&self, name: &str) -> Option<MigrateError> {
        match self {
            Resolution::Missing(side) => Some(MigrateError::ModelNotFound {
                name: name.to_string(),
                side: *side,
            }),
            Resolution::Resolved(_) => None,
        }
    }
}

/// Find `name` on the destination, then on the source.
pub async fn resolve_model(pipeline: &Pipeline<'_>, name: &str) -> Result<Resolution> {
    let destination = pipeline.destination;
    let Some(dest_model) = pipeline
        .remote(destination, "find model", move || destination.find_model(name))
        .await?
    else {
        return Ok(Resolution::Missing(StoreSide::Destination));
    };

    let source = pipeline.source;
    let Some(source_model) = pipeline
        .remote(source, "find model", move || source.find_model(name))
        .await?
    else {
        return Ok(Resolution::Missing(StoreSide::Source));
    };

    debug!(
        "Resolved '{}': source {} -> destination {}",
        name, source_model.id, dest_model.id
    );
    Ok(Resolution::Resolved(ResolvedModel {
        name: name.to_string(),
        source_id: source_model.id,
        destination_id: dest_model.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationOptions;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_resolves_exact_name_only() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        let src_id = source.add_model("BOM-PUTZMEISTER");
        let dst_id = dest.add_model("BOM-PUTZMEISTER");
        dest.add_model("bom-putzmeister-2");

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);

        let resolved = resolve_model(&pipeline, "BOM-PUTZMEISTER").await.unwrap();
        assert_eq!(
            resolved,
            Resolution::Resolved(ResolvedModel {
                name: "BOM-PUTZMEISTER".into(),
                source_id: src_id,
                destination_id: dst_id,
            })
        );

        let lower = resolve_model(&pipeline, "bom-putzmeister").await.unwrap();
        assert_eq!(lower, Resolution::Missing(StoreSide::Destination));
    }

    #[tokio::test]
    async fn test_missing_in_source_is_distinct() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        dest.add_model("SCHWING-S36");

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);

        let resolution = resolve_model(&pipeline, "SCHWING-S36").await.unwrap();
        assert_eq!(resolution, Resolution::Missing(StoreSide::Source));
        assert_eq!(
            resolution.missing_error("SCHWING-S36").unwrap().to_string(),
            "Model 'SCHWING-S36' not found in source"
        );
    }

    #[tokio::test]
    async fn test_destination_missing_skips_source_lookup() {
        let source = MemoryStore::new("source");
        let dest = MemoryStore::new("dest");
        source.add_model("A");

        let options = MigrationOptions::default();
        let pipeline = Pipeline::new(&source, &dest, &options);

        resolve_model(&pipeline, "A").await.unwrap();
        assert!(source.calls().find_model.is_empty());
    }
}
