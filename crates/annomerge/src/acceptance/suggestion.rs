//! Accepting suggestions from virtual annotators, with an audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{CurationError, Result};
use crate::merge::{MergeOutcome, MergedAnnotationSet};
use crate::model::{AnnotatorId, Position, SourceRecord};

use super::ops::{copy_or_upsert_relation, copy_span};

/// What a user did with a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningAction {
    /// Copied into the curator set.
    Accepted,
    /// Dismissed.
    Rejected,
}

impl LearningAction {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            LearningAction::Accepted => "Accepted",
            LearningAction::Rejected => "Rejected",
        }
    }
}

/// Audit event for a decision on a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    /// Document the suggestion was made on.
    pub document: String,

    /// Layer of the suggested annotation.
    pub layer: String,

    /// Where the suggestion was made.
    pub position: Position,

    /// Feature snapshot of the suggested annotation.
    pub annotation: Value,

    /// The suggestion source (e.g. a recommender).
    pub source: AnnotatorId,

    /// Who decided.
    pub user: AnnotatorId,

    pub action: LearningAction,

    /// When the decision was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Receives audit events. Owned by the embedding system.
pub trait LearningRecordSink {
    /// Store one event.
    fn record(&mut self, record: LearningRecord);
}

/// Sink keeping audit events in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLearningRecords {
    records: Vec<LearningRecord>,
}

impl InMemoryLearningRecords {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in recording order.
    pub fn records(&self) -> &[LearningRecord] {
        &self.records
    }

    /// Events recorded for one user.
    pub fn by_user<'a>(&'a self, user: &'a AnnotatorId) -> impl Iterator<Item = &'a LearningRecord> {
        self.records.iter().filter(move |r| &r.user == user)
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LearningRecordSink for InMemoryLearningRecords {
    fn record(&mut self, record: LearningRecord) {
        self.records.push(record);
    }
}

/// Accept a suggestion into the curator set.
///
/// Upserts exactly like [`copy_span`] or [`copy_or_upsert_relation`],
/// depending on the layer, then records the acceptance in `sink`. Nothing
/// is recorded if the copy fails.
pub fn accept_suggestion(
    curator: &mut MergedAnnotationSet,
    suggestion: SourceRecord<'_>,
    allow_stacking: bool,
    sink: &mut dyn LearningRecordSink,
    user: &AnnotatorId,
) -> Result<MergeOutcome> {
    let position = suggestion_position(suggestion)?;
    let outcome = if suggestion.layer()?.is_relation() {
        copy_or_upsert_relation(curator, suggestion, allow_stacking)?
    } else {
        copy_span(curator, suggestion, allow_stacking)?
    };

    info!(
        document = %curator.document(),
        %position,
        source = %suggestion.set.annotator,
        %user,
        "Suggestion accepted"
    );

    let document = curator.document().to_string();
    sink.record(learning_record(
        document,
        position,
        suggestion,
        user,
        LearningAction::Accepted,
    ));

    Ok(outcome)
}

/// Record that a suggestion was dismissed. The curator set is not touched.
pub fn reject_suggestion(
    document: &str,
    suggestion: SourceRecord<'_>,
    sink: &mut dyn LearningRecordSink,
    user: &AnnotatorId,
) -> Result<()> {
    let position = suggestion_position(suggestion)?;
    info!(document, %position, source = %suggestion.set.annotator, %user, "Suggestion rejected");
    sink.record(learning_record(
        document.to_string(),
        position,
        suggestion,
        user,
        LearningAction::Rejected,
    ));
    Ok(())
}

fn suggestion_position(suggestion: SourceRecord<'_>) -> Result<Position> {
    suggestion
        .position()
        .ok_or_else(|| CurationError::UnknownRecord {
            annotator: suggestion.set.annotator.clone(),
            record: suggestion.record.id,
        })
}

fn learning_record(
    document: String,
    position: Position,
    suggestion: SourceRecord<'_>,
    user: &AnnotatorId,
    action: LearningAction,
) -> LearningRecord {
    LearningRecord {
        document,
        layer: suggestion.record.layer.clone(),
        position,
        annotation: suggestion.record.features_json(),
        source: suggestion.set.annotator.clone(),
        user: user.clone(),
        action,
        recorded_at: Utc::now(),
    }
}
