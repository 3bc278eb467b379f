//! The curator's working set.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::diff::{same_value_features, Configuration, DiffResult, PositionState};
use crate::model::{
    AnnotationLayer, AnnotationRecord, AnnotationSet, AnnotatorId, FeatureKind, FeatureValue, Position,
    Schema,
};

/// Current version of the curator set format.
pub const CURATION_FORMAT_VERSION: &str = "1.0.0";

/// State of a position as seen by the curator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CuratorState {
    /// No curator record and nothing to resolve.
    NoAnnotation,
    /// The curator record matches what all annotators agree on.
    Agreed,
    /// Annotators disagree (or stacked) and the curator has not decided.
    Disagreed,
    /// Some annotator has no record and the curator has not decided.
    Incomplete,
    /// The curator picked one of the annotators' configurations.
    ManuallyResolved,
    /// The curator record matches no annotator.
    Custom,
}

impl CuratorState {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            CuratorState::NoAnnotation => "No annotation",
            CuratorState::Agreed => "Agreed",
            CuratorState::Disagreed => "Disagreed",
            CuratorState::Incomplete => "Incomplete",
            CuratorState::ManuallyResolved => "Manually resolved",
            CuratorState::Custom => "Custom",
        }
    }

    /// Check if the curator still has to act on the position.
    pub fn needs_attention(&self) -> bool {
        matches!(self, CuratorState::Disagreed | CuratorState::Incomplete)
    }
}

/// The single mutable annotation set a curator works on.
///
/// Created once per curation session, mutated by the merge engine and by
/// the acceptance operations, persisted by a
/// [`CuratorDocumentStore`](crate::interfaces::CuratorDocumentStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedAnnotationSet {
    /// Version of the format.
    pub format_version: String,

    /// When the set was created.
    pub created_at: DateTime<Utc>,

    /// When the set was last changed.
    pub updated_at: DateTime<Utc>,

    set: AnnotationSet,
}

impl MergedAnnotationSet {
    /// Create an empty curator set.
    pub fn new(curator: impl Into<AnnotatorId>, document: impl Into<String>, schema: Schema) -> Self {
        Self::wrap(AnnotationSet::new(curator, document, schema))
    }

    /// Seed a curator set from one annotator's records.
    pub fn from_seed(seed: &AnnotationSet, curator: impl Into<AnnotatorId>) -> Self {
        let mut set = seed.clone();
        set.annotator = curator.into();
        Self::wrap(set)
    }

    fn wrap(set: AnnotationSet) -> Self {
        let now = Utc::now();
        Self {
            format_version: CURATION_FORMAT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            set,
        }
    }

    /// Identity of the curator.
    pub fn curator(&self) -> &AnnotatorId {
        &self.set.annotator
    }

    /// Document the set belongs to.
    pub fn document(&self) -> &str {
        &self.set.document
    }

    /// The underlying annotation set.
    pub fn set(&self) -> &AnnotationSet {
        &self.set
    }

    /// Mutable access for direct curator edits.
    ///
    /// Marks the set as updated.
    pub fn set_mut(&mut self) -> &mut AnnotationSet {
        self.touch();
        &mut self.set
    }

    /// Mutable access for the merge engine and acceptance operations.
    ///
    /// Callers touch the set themselves once they know something changed.
    pub(crate) fn inner_mut(&mut self) -> &mut AnnotationSet {
        &mut self.set
    }

    /// Consume the wrapper and return the annotation set.
    pub fn into_set(self) -> AnnotationSet {
        self.set
    }

    /// Layer definitions of the curator set.
    pub fn schema(&self) -> &Schema {
        self.set.schema()
    }

    /// All curator records at a position.
    pub fn at_position(&self, position: &Position) -> Vec<&AnnotationRecord> {
        self.set.at_position(position)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Check if the set has no records.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Mark the set as updated.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Derive the curator-facing state of a position.
    pub fn curator_state(&self, position: &Position, diff: &DiffResult) -> CuratorState {
        let records = self.at_position(position);
        let set = diff.configuration_set(position);

        let Some(set) = set else {
            return if records.is_empty() {
                CuratorState::NoAnnotation
            } else {
                CuratorState::Custom
            };
        };

        let state = set.state();
        if records.is_empty() {
            return match state {
                PositionState::Agreed => CuratorState::NoAnnotation,
                PositionState::Incomplete => CuratorState::Incomplete,
                PositionState::Disagreed | PositionState::Stacked => CuratorState::Disagreed,
            };
        }

        let Some(layer) = diff.layer(position.layer()) else {
            return CuratorState::Custom;
        };
        let matches_annotator = set
            .configurations
            .iter()
            .filter_map(Configuration::representative)
            .any(|rep| records.iter().all(|r| same_value_features(layer, r, &rep.record)));

        match (state, matches_annotator) {
            (PositionState::Agreed, true) => CuratorState::Agreed,
            (_, true) => CuratorState::ManuallyResolved,
            _ => CuratorState::Custom,
        }
    }
}

/// Scalar features of a record, as copied into the curator set.
///
/// Null values are left out; references and slot links are not copied.
pub(crate) fn scalar_features(
    layer: &AnnotationLayer,
    record: &AnnotationRecord,
) -> IndexMap<String, FeatureValue> {
    layer
        .features
        .iter()
        .filter(|f| matches!(f.kind, FeatureKind::Primitive | FeatureKind::StringArray))
        .filter_map(|f| {
            let value = record.feature(&f.name);
            (!value.is_null()).then(|| (f.name.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfig;
    use crate::diff::CasDiff;
    use crate::model::Feature;

    fn schema() -> Schema {
        Schema::new().with_layer(AnnotationLayer::span("NE").with_feature(Feature::primitive("value")))
    }

    fn annotator(name: &str, value: &str) -> AnnotationSet {
        let mut set = AnnotationSet::new(name, "doc", schema());
        let id = set.add_span("NE", 10, 15).unwrap();
        set.set_feature(id, "value", value).unwrap();
        set
    }

    fn diff(sets: &[&AnnotationSet]) -> DiffResult {
        CasDiff::new(DiffConfig::new().with_layer("NE")).diff(sets)
    }

    #[test]
    fn test_from_seed_renames_owner() {
        let seed = annotator("anna", "ORG");
        let merged = MergedAnnotationSet::from_seed(&seed, "CURATION_USER");

        assert_eq!(merged.curator().as_str(), "CURATION_USER");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.format_version, CURATION_FORMAT_VERSION);
    }

    #[test]
    fn test_curator_state_transitions() {
        let a = annotator("a", "ORG");
        let b = annotator("b", "LOC");
        let position = Position::span("NE", 10, 15);
        let disagreeing = diff(&[&a, &b]);

        let mut merged = MergedAnnotationSet::new("cur", "doc", schema());
        assert_eq!(merged.curator_state(&position, &disagreeing), CuratorState::Disagreed);

        let id = merged.set_mut().add_span("NE", 10, 15).unwrap();
        merged.set_mut().set_feature(id, "value", "LOC").unwrap();
        assert_eq!(
            merged.curator_state(&position, &disagreeing),
            CuratorState::ManuallyResolved
        );

        merged.set_mut().set_feature(id, "value", "MISC").unwrap();
        assert_eq!(merged.curator_state(&position, &disagreeing), CuratorState::Custom);
    }

    #[test]
    fn test_curator_state_for_agreed_position() {
        let a = annotator("a", "ORG");
        let b = annotator("b", "ORG");
        let position = Position::span("NE", 10, 15);
        let agreeing = diff(&[&a, &b]);

        let merged = MergedAnnotationSet::from_seed(&a, "cur");
        assert_eq!(merged.curator_state(&position, &agreeing), CuratorState::Agreed);

        let empty = MergedAnnotationSet::new("cur", "doc", schema());
        assert_eq!(empty.curator_state(&position, &agreeing), CuratorState::NoAnnotation);
        assert!(!CuratorState::NoAnnotation.needs_attention());
    }

    #[test]
    fn test_scalar_features_skip_nulls_and_links() {
        let layer = AnnotationLayer::span("Event")
            .with_feature(Feature::primitive("type"))
            .with_feature(Feature::primitive("modality"))
            .with_feature(Feature::slot("args", "NE"));
        let mut features = IndexMap::new();
        features.insert("type".to_string(), FeatureValue::from("Attack"));
        features.insert("args".to_string(), FeatureValue::Links(Vec::new()));
        let record = AnnotationRecord {
            id: crate::model::RecordId(1),
            layer: "Event".into(),
            begin: 0,
            end: 5,
            features,
        };

        let copied = scalar_features(&layer, &record);
        assert_eq!(copied.len(), 1);
        assert_eq!(copied["type"], FeatureValue::from("Attack"));
    }
}
