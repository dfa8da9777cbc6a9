//! Interval alignment by `interval_value`.

use super::{Pipeline, ResolvedModel};
use crate::error::{Result, StoreSide};
use crate::models::{IntervalRecord, RecordId};
use std::collections::HashMap;
use tracing::debug;

/// Source → destination interval mapping for one model.
#[derive(Debug, Clone, Default)]
pub struct IntervalMatch {
    /// Matched (source, destination) pairs in source order.
    pub pairs: Vec<(RecordId, RecordId)>,
    pub mapping: HashMap<RecordId, RecordId>,
    /// Source intervals with no destination counterpart.
    pub unmatched: Vec<IntervalRecord>,
    /// Values that occur more than once under the model on one side.
    pub duplicate_values: Vec<(StoreSide, f64)>,
}

impl IntervalMatch {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Matched source interval IDs in source order.
    pub fn source_ids(&self) -> Vec<RecordId> {
        self.pairs.iter().map(|(source, _)| source.clone()).collect()
    }

    pub fn destination_for(&self, source_id: &RecordId) -> Option<&RecordId> {
        self.mapping.get(source_id)
    }

    /// Non-fatal warnings for the model's skip reasons.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.unmatched.is_empty() {
            let labels: Vec<String> = self.unmatched.iter().map(|i| i.label()).collect();
            warnings.push(format!(
                "{} unmatched interval(s): {}",
                self.unmatched.len(),
                labels.join(", ")
            ));
        }
        for (side, value) in &self.duplicate_values {
            warnings.push(format!(
                "Duplicate interval value {}h in {}; first match used",
                value, side
            ));
        }
        warnings
    }
}

/// Align source intervals with destination intervals of equal value.
///
/// Equality is exact. When several destination intervals share a value the
/// first in `destination` order wins.
pub fn match_intervals(source: &[IntervalRecord], destination: &[IntervalRecord]) -> IntervalMatch {
    let mut result = IntervalMatch {
        duplicate_values: duplicate_values(StoreSide::Source, source)
            .into_iter()
            .chain(duplicate_values(StoreSide::Destination, destination))
            .collect(),
        ..Default::default()
    };

    for interval in source {
        match destination
            .iter()
            .find(|d| d.interval_value == interval.interval_value)
        {
            Some(dest) => {
                result.pairs.push((interval.id.clone(), dest.id.clone()));
                result.mapping.insert(interval.id.clone(), dest.id.clone());
            }
            None => result.unmatched.push(interval.clone()),
        }
    }

    result
}

fn duplicate_values(side: StoreSide, intervals: &[IntervalRecord]) -> Vec<(StoreSide, f64)> {
    let mut seen: Vec<f64> = Vec::new();
    let mut duplicates: Vec<(StoreSide, f64)> = Vec::new();
    for interval in intervals {
        let value = interval.interval_value;
        if seen.contains(&value) {
            if !duplicates.iter().any(|(_, v)| *v == value) {
                duplicates.push((side, value));
            }
        } else {
            seen.push(value);
        }
    }
    duplicates
}

/// Load both interval lists for a model and match them.
pub async fn load_and_match(pipeline: &Pipeline<'_>, model: &ResolvedModel) -> Result<IntervalMatch> {
    let source = pipeline.source;
    let source_id = &model.source_id;
    let source_intervals = pipeline
        .remote(source, "load intervals", move || source.list_intervals(source_id))
        .await?;

    let destination = pipeline.destination;
    let destination_id = &model.destination_id;
    let destination_intervals = pipeline
        .remote(destination, "load intervals", move || {
            destination.list_intervals(destination_id)
        })
        .await?;

    let matched = match_intervals(&source_intervals, &destination_intervals);
    debug!(
        "'{}': {} source / {} destination intervals, {} matched",
        model.name,
        source_intervals.len(),
        destination_intervals.len(),
        matched.pairs.len()
    );
    Ok(matched)
}
