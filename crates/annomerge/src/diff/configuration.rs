//! Configurations: distinct feature-value signatures observed at a position.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{
    AnnotationLayer, AnnotationRecord, AnnotatorId, FeatureKind, Position, RecordId, Schema, SourceRecord,
};

/// A resolved slot link: role, the filler's position and its base features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTarget {
    pub role: String,
    /// `None` if the filler reference dangles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Primitive and string-array features of the filler, as compact JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filler: Option<String>,
}

/// A record copied out of its annotator's set, with its references
/// resolved to positions so it can be used without the original set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Annotator the record came from.
    pub annotator: AnnotatorId,

    /// The record as it appears in the annotator's set.
    pub record: AnnotationRecord,

    /// Resolved slot links per slot feature, in link order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, Vec<LinkTarget>>,

    /// Positions of reference features other than relation endpoints.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub references: IndexMap<String, Option<Position>>,

    /// Source and target positions, for relations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<(Position, Position)>,
}

impl CandidateRecord {
    /// Resolve a record against its set.
    pub fn from_source(source: SourceRecord<'_>, layer: &AnnotationLayer) -> Self {
        let mut links = IndexMap::new();
        for feature in layer.slot_features() {
            let resolved = source
                .record
                .links(&feature.name)
                .iter()
                .map(|link| {
                    let filler = source.resolve(link.target);
                    LinkTarget {
                        role: link.role.clone(),
                        position: filler.and_then(|filler| source.set.position_of(filler)),
                        filler: filler.and_then(|filler| base_signature(source.set.schema(), filler)),
                    }
                })
                .collect();
            links.insert(feature.name.clone(), resolved);
        }

        let references = layer
            .value_features()
            .filter(|f| f.kind == FeatureKind::Reference)
            .map(|feature| {
                let position = source
                    .record
                    .feature(&feature.name)
                    .as_ref_id()
                    .and_then(|id| source.resolve(id))
                    .and_then(|target| source.set.position_of(target));
                (feature.name.clone(), position)
            })
            .collect();

        let endpoints = layer.endpoint_features().and_then(|(source_feature, target_feature)| {
            let endpoint = |name: &str| {
                let id = source.record.feature(name).as_ref_id()?;
                source.set.position_of(source.resolve(id)?)
            };
            Some((endpoint(source_feature)?, endpoint(target_feature)?))
        });

        Self {
            annotator: source.set.annotator.clone(),
            record: source.record.clone(),
            links,
            references,
            endpoints,
        }
    }

    /// Resolved links of a slot feature.
    pub fn links(&self, feature: &str) -> &[LinkTarget] {
        self.links.get(feature).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolved position of a reference feature.
    pub fn reference(&self, feature: &str) -> Option<&Position> {
        self.references.get(feature).and_then(Option::as_ref)
    }
}

/// One distinct signature at a position and the annotators sharing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Stable digest of the signature.
    pub fingerprint: String,

    /// Records per annotator, in annotator order.
    pub records: IndexMap<AnnotatorId, Vec<CandidateRecord>>,
}

impl Configuration {
    pub(crate) fn new(layer: &AnnotationLayer, first: CandidateRecord) -> Self {
        let fingerprint = fingerprint(layer, &first);
        let mut records = IndexMap::new();
        records.insert(first.annotator.clone(), vec![first]);
        Self {
            fingerprint,
            records,
        }
    }

    pub(crate) fn push(&mut self, candidate: CandidateRecord) {
        self.records
            .entry(candidate.annotator.clone())
            .or_default()
            .push(candidate);
    }

    /// The record all others were compared against.
    pub fn representative(&self) -> Option<&CandidateRecord> {
        self.records.values().next().and_then(|records| records.first())
    }

    /// All records of the first annotator in this configuration.
    pub fn representatives(&self) -> &[CandidateRecord] {
        self.records
            .values()
            .next()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Annotators sharing this configuration.
    pub fn annotators(&self) -> impl Iterator<Item = &AnnotatorId> {
        self.records.keys()
    }

    /// Check if an annotator contributed to this configuration.
    pub fn contains(&self, annotator: &AnnotatorId) -> bool {
        self.records.contains_key(annotator)
    }

    /// Number of records an annotator contributed.
    pub fn record_count(&self, annotator: &AnnotatorId) -> usize {
        self.records.get(annotator).map_or(0, Vec::len)
    }

    /// Ids of an annotator's records in this configuration.
    pub fn record_ids(&self, annotator: &AnnotatorId) -> Vec<RecordId> {
        self.records
            .get(annotator)
            .map(|records| records.iter().map(|c| c.record.id).collect())
            .unwrap_or_default()
    }
}

/// Agreement state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    /// All annotators contributed one identical signature.
    Agreed,
    /// Several signatures, or a relation whose endpoints disagree.
    Disagreed,
    /// Some annotator has no record here. Not scored.
    Incomplete,
    /// Some annotator stacked records in a way that cannot be aligned.
    Stacked,
}

impl PositionState {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::Agreed => "Agreed",
            PositionState::Disagreed => "Disagreed",
            PositionState::Incomplete => "Incomplete",
            PositionState::Stacked => "Stacked",
        }
    }
}

/// All configurations observed at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSet {
    /// The position.
    pub position: Position,

    /// Distinct configurations, in order of first appearance.
    pub configurations: Vec<Configuration>,

    /// Annotators with at least one record here, sorted.
    pub annotators: Vec<AnnotatorId>,

    /// An annotator stacked records that cannot be aligned.
    pub stacked: bool,

    /// Fewer contributors than annotators diffed.
    pub incomplete: bool,

    /// Relation only: an endpoint position does not agree.
    #[serde(default)]
    pub endpoint_disagreement: bool,
}

impl ConfigurationSet {
    /// More than one configuration, or incomplete.
    pub fn has_differences(&self) -> bool {
        self.configurations.len() != 1 || self.incomplete
    }

    /// Derived agreement state.
    ///
    /// Incompleteness dominates, then stacking, then disagreement.
    pub fn state(&self) -> PositionState {
        if self.incomplete {
            PositionState::Incomplete
        } else if self.stacked {
            PositionState::Stacked
        } else if self.configurations.len() != 1 || self.endpoint_disagreement {
            PositionState::Disagreed
        } else {
            PositionState::Agreed
        }
    }

    /// Check if every annotator fully agrees here.
    pub fn is_agreeing(&self) -> bool {
        self.state() == PositionState::Agreed
    }

    /// The single agreeing configuration, if any.
    pub fn agreed_configuration(&self) -> Option<&Configuration> {
        if self.is_agreeing() {
            self.configurations.first()
        } else {
            None
        }
    }

    /// Configurations an annotator contributed to.
    pub fn configurations_of<'a>(&'a self, annotator: &'a AnnotatorId) -> impl Iterator<Item = &'a Configuration> {
        self.configurations.iter().filter(move |c| c.contains(annotator))
    }

    /// Total records an annotator contributed at this position.
    pub fn record_count(&self, annotator: &AnnotatorId) -> usize {
        self.configurations.iter().map(|c| c.record_count(annotator)).sum()
    }
}

/// Compact JSON of a record's primitive and string-array features.
fn base_signature(schema: &Schema, record: &AnnotationRecord) -> Option<String> {
    let layer = schema.layer(&record.layer)?;
    let values: serde_json::Map<String, serde_json::Value> = layer
        .value_features()
        .filter(|f| matches!(f.kind, FeatureKind::Primitive | FeatureKind::StringArray))
        .map(|f| (f.name.clone(), record.feature(&f.name).to_json()))
        .collect();
    Some(serde_json::Value::Object(values).to_string())
}

/// Digest of a candidate's comparable signature.
///
/// Scalar features are taken in layer order, links as role plus filler
/// position and filler base features, references as the referenced
/// position. Record ids and offsets of the record itself are excluded.
pub fn fingerprint(layer: &AnnotationLayer, candidate: &CandidateRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(layer.name.as_bytes());

    for feature in layer.value_features() {
        hasher.update(b"\x1f");
        hasher.update(feature.name.as_bytes());
        hasher.update(b"=");
        match &feature.kind {
            FeatureKind::SlotLink { .. } => {
                for link in candidate.links(&feature.name) {
                    hasher.update(link.role.as_bytes());
                    hasher.update(b"@");
                    if let Some(position) = &link.position {
                        hasher.update(position.to_string().as_bytes());
                    }
                    hasher.update(b"#");
                    if let Some(filler) = &link.filler {
                        hasher.update(filler.as_bytes());
                    }
                    hasher.update(b";");
                }
            }
            FeatureKind::Reference => {
                if let Some(position) = candidate.reference(&feature.name) {
                    hasher.update(position.to_string().as_bytes());
                }
            }
            _ => {
                let value = candidate.record.feature(&feature.name).to_json();
                hasher.update(value.to_string().as_bytes());
            }
        }
    }

    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationSet, Feature, FeatureValue, Link, Schema};

    fn layer() -> AnnotationLayer {
        AnnotationLayer::span("Event")
            .with_feature(Feature::primitive("type"))
            .with_feature(Feature::slot("args", "Token"))
    }

    fn schema() -> Schema {
        Schema::new()
            .with_layer(AnnotationLayer::span("Token"))
            .with_layer(layer())
    }

    fn candidate(annotator: &str, event_type: &str) -> CandidateRecord {
        let mut set = AnnotationSet::new(annotator, "doc", schema());
        let token = set.add_span("Token", 0, 4).unwrap();
        let event = set.add_span("Event", 0, 10).unwrap();
        set.set_feature(event, "type", event_type).unwrap();
        set.push_link(event, "args", Link::new("agent", token)).unwrap();
        CandidateRecord::from_source(set.source(event).unwrap(), &layer())
    }

    #[test]
    fn test_candidate_resolves_link_positions() {
        let c = candidate("a", "Attack");
        assert_eq!(
            c.links("args"),
            &[LinkTarget {
                role: "agent".into(),
                position: Some(Position::span("Token", 0, 4)),
                filler: Some("{}".into()),
            }]
        );
        assert!(c.endpoints.is_none());
    }

    #[test]
    fn test_fingerprint_is_independent_of_annotator() {
        let a = candidate("a", "Attack");
        let b = candidate("b", "Attack");
        let c = candidate("c", "Meet");

        assert_eq!(fingerprint(&layer(), &a), fingerprint(&layer(), &b));
        assert_ne!(fingerprint(&layer(), &a), fingerprint(&layer(), &c));
        assert!(fingerprint(&layer(), &a).starts_with("sha256:"));
    }

    fn filler_schema() -> Schema {
        Schema::new()
            .with_layer(AnnotationLayer::span("NE").with_feature(Feature::primitive("value")))
            .with_layer(
                AnnotationLayer::span("Event")
                    .with_feature(Feature::slot("args", "NE"))
                    .with_feature(Feature::reference("trigger")),
            )
    }

    /// An event whose agent is an NE of `value`; `padding` shifts record ids.
    fn event_candidate(value: &str, padding: usize) -> (AnnotationLayer, CandidateRecord) {
        let schema = filler_schema();
        let mut set = AnnotationSet::new("a", "doc", schema.clone());
        for i in 0..padding {
            set.add_span("NE", 50 + i, 51 + i).unwrap();
        }
        let agent = set.add_span("NE", 0, 4).unwrap();
        set.set_feature(agent, "value", value).unwrap();
        let trigger = set.add_span("NE", 5, 9).unwrap();
        let event = set.add_span("Event", 0, 20).unwrap();
        set.push_link(event, "args", Link::new("agent", agent)).unwrap();
        set.set_feature(event, "trigger", FeatureValue::Ref(trigger)).unwrap();

        let layer = schema.layer("Event").unwrap().clone();
        let candidate = CandidateRecord::from_source(set.source(event).unwrap(), &layer);
        (layer, candidate)
    }

    #[test]
    fn test_fingerprint_covers_filler_values() {
        let (layer, per) = event_candidate("PER", 0);
        let (_, org) = event_candidate("ORG", 0);

        assert_eq!(per.links("args")[0].filler.as_deref(), Some(r#"{"value":"PER"}"#));
        assert_ne!(fingerprint(&layer, &per), fingerprint(&layer, &org));
    }

    #[test]
    fn test_fingerprint_uses_referenced_position_not_id() {
        let (layer, plain) = event_candidate("PER", 0);
        let (_, shifted) = event_candidate("PER", 3);

        assert_ne!(plain.record.feature("trigger"), shifted.record.feature("trigger"));
        assert_eq!(plain.reference("trigger"), Some(&Position::span("NE", 5, 9)));
        assert_eq!(fingerprint(&layer, &plain), fingerprint(&layer, &shifted));
    }

    #[test]
    fn test_state_precedence() {
        let mut set = ConfigurationSet {
            position: Position::span("Event", 0, 10),
            configurations: vec![Configuration::new(&layer(), candidate("a", "Attack"))],
            annotators: vec!["a".into()],
            stacked: false,
            incomplete: false,
            endpoint_disagreement: false,
        };
        assert_eq!(set.state(), PositionState::Agreed);
        assert!(!set.has_differences());

        set.endpoint_disagreement = true;
        assert_eq!(set.state(), PositionState::Disagreed);

        set.stacked = true;
        assert_eq!(set.state(), PositionState::Stacked);

        set.incomplete = true;
        assert_eq!(set.state(), PositionState::Incomplete);
        assert!(set.has_differences());
    }
}
