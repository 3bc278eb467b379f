//! Per-annotator annotation sets.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CurationError, Result};

use super::layer::{AnnotationLayer, LayerKind, Schema};
use super::position::Position;
use super::record::{AnnotationRecord, FeatureValue, Link, RecordId};

/// Identifier of an annotator (or of the curator, or of a suggestion source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotatorId(pub String);

impl AnnotatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotatorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AnnotatorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A half-open text window `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextWindow {
    pub begin: usize,
    pub end: usize,
}

impl TextWindow {
    /// Create a window over `[begin, end)`.
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// A window covering the whole document.
    pub fn unbounded() -> Self {
        Self {
            begin: 0,
            end: usize::MAX,
        }
    }

    /// Check if `[begin, end)` lies entirely inside the window.
    pub fn contains(&self, begin: usize, end: usize) -> bool {
        self.begin <= begin && end <= self.end
    }
}

impl Default for TextWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A record together with the set it lives in.
///
/// References held by the record (relation endpoints, slot fillers) are
/// only meaningful relative to `set`.
#[derive(Debug, Clone, Copy)]
pub struct SourceRecord<'a> {
    pub set: &'a AnnotationSet,
    pub record: &'a AnnotationRecord,
}

impl<'a> SourceRecord<'a> {
    /// Position of the record, if its references resolve.
    pub fn position(&self) -> Option<Position> {
        self.set.position_of(self.record)
    }

    /// Layer definition as seen by the owning set.
    pub fn layer(&self) -> Result<&'a AnnotationLayer> {
        self.set.schema().require(&self.record.layer)
    }

    /// Resolve a set-local reference.
    pub fn resolve(&self, id: RecordId) -> Option<&'a AnnotationRecord> {
        self.set.record(id)
    }
}

/// All annotations of one annotator on one document.
///
/// Sets are frozen while a diff or merge pass reads them; only the curator's
/// set is mutated, and only through the merge engine and acceptance
/// operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    /// Owner of the annotations.
    pub annotator: AnnotatorId,

    /// Document the annotations belong to.
    pub document: String,

    /// Layer definitions as known to this set.
    schema: Schema,

    records: IndexMap<RecordId, AnnotationRecord>,

    next_id: u64,
}

impl AnnotationSet {
    /// Create an empty set.
    pub fn new(annotator: impl Into<AnnotatorId>, document: impl Into<String>, schema: Schema) -> Self {
        Self {
            annotator: annotator.into(),
            document: document.into(),
            schema,
            records: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Layer definitions as known to this set.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Replace the layer definitions (e.g. after a type system upgrade).
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    /// Get a record by id.
    pub fn record(&self, id: RecordId) -> Option<&AnnotationRecord> {
        self.records.get(&id)
    }

    /// Get a record by id, failing if absent.
    pub fn require(&self, id: RecordId) -> Result<&AnnotationRecord> {
        self.record(id).ok_or_else(|| CurationError::UnknownRecord {
            annotator: self.annotator.clone(),
            record: id,
        })
    }

    /// Pair a record with this set.
    pub fn source(&self, id: RecordId) -> Result<SourceRecord<'_>> {
        Ok(SourceRecord {
            set: self,
            record: self.require(id)?,
        })
    }

    /// Iterate over all records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.values()
    }

    /// Iterate over the records of one layer.
    pub fn records_in<'s>(&'s self, layer: &str) -> impl Iterator<Item = &'s AnnotationRecord> {
        self.records.values().filter(move |r| r.layer == layer)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a span annotation.
    pub fn add_span(&mut self, layer: &str, begin: usize, end: usize) -> Result<RecordId> {
        let definition = self.schema.require(layer)?;
        if definition.is_relation() {
            return Err(CurationError::UnsupportedLayer {
                layer: layer.to_string(),
                kind: definition.kind.label().to_string(),
            });
        }
        Ok(self.insert(layer, begin, end, IndexMap::new()))
    }

    /// Add a relation between two records of this set.
    ///
    /// The relation's offsets are taken from the target record.
    pub fn add_relation(&mut self, layer: &str, source: RecordId, target: RecordId) -> Result<RecordId> {
        let definition = self.schema.require(layer)?;
        let (source_feature, target_feature) = match &definition.kind {
            LayerKind::Relation {
                source_feature,
                target_feature,
            } => (source_feature.clone(), target_feature.clone()),
            other => {
                return Err(CurationError::UnsupportedLayer {
                    layer: layer.to_string(),
                    kind: other.label().to_string(),
                });
            }
        };
        self.require(source)?;
        let (begin, end) = {
            let target = self.require(target)?;
            (target.begin, target.end)
        };

        let mut features = IndexMap::new();
        features.insert(source_feature, FeatureValue::Ref(source));
        features.insert(target_feature, FeatureValue::Ref(target));
        Ok(self.insert(layer, begin, end, features))
    }

    /// Set a feature value on a record.
    pub fn set_feature(&mut self, id: RecordId, name: &str, value: impl Into<FeatureValue>) -> Result<()> {
        let annotator = self.annotator.clone();
        let record = self
            .records
            .get_mut(&id)
            .ok_or(CurationError::UnknownRecord { annotator, record: id })?;
        record.features.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Append a slot link to a record's link feature.
    pub fn push_link(&mut self, id: RecordId, feature: &str, link: Link) -> Result<()> {
        let mut links = self.require(id)?.links(feature).to_vec();
        links.push(link);
        self.set_feature(id, feature, FeatureValue::Links(links))
    }

    /// Insert a record with pre-built features and return its new id.
    pub(crate) fn insert(
        &mut self,
        layer: &str,
        begin: usize,
        end: usize,
        features: IndexMap<String, FeatureValue>,
    ) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            AnnotationRecord {
                id,
                layer: layer.to_string(),
                begin,
                end,
                features,
            },
        );
        id
    }

    /// Mutable access for the merge engine.
    pub(crate) fn record_mut(&mut self, id: RecordId) -> Option<&mut AnnotationRecord> {
        self.records.get_mut(&id)
    }

    /// Remove a record, keeping the remaining order.
    pub fn remove(&mut self, id: RecordId) -> Option<AnnotationRecord> {
        self.records.shift_remove(&id)
    }

    /// Remove a record and everything that would dangle without it.
    ///
    /// Relations using the record as an endpoint are removed (recursively),
    /// and slot links pointing at it are dropped from their arrays. Returns
    /// the ids of all removed records, `id` first.
    pub fn remove_cascading(&mut self, id: RecordId) -> Vec<RecordId> {
        let mut removed = Vec::new();
        let mut pending = vec![id];

        while let Some(next) = pending.pop() {
            if self.remove(next).is_none() {
                continue;
            }
            removed.push(next);

            for record in self.records.values_mut() {
                for value in record.features.values_mut() {
                    match value {
                        FeatureValue::Ref(target) if *target == next => {
                            pending.push(record.id);
                        }
                        FeatureValue::Links(links) => {
                            links.retain(|link| link.target != next);
                        }
                        _ => {}
                    }
                }
            }
        }

        removed
    }

    /// Compute the position of a record of this set.
    ///
    /// Returns `None` if the layer is unknown or a relation endpoint does
    /// not resolve.
    pub fn position_of(&self, record: &AnnotationRecord) -> Option<Position> {
        let layer = self.schema.layer(&record.layer)?;
        match layer.endpoint_features() {
            None => Some(Position::span(&record.layer, record.begin, record.end)),
            Some((source_feature, target_feature)) => {
                let source = self.record(record.feature(source_feature).as_ref_id()?)?;
                let target = self.record(record.feature(target_feature).as_ref_id()?)?;
                Some(Position::relation(
                    &record.layer,
                    (source.begin, source.end),
                    (target.begin, target.end),
                ))
            }
        }
    }

    /// All records at a position.
    pub fn at_position(&self, position: &Position) -> Vec<&AnnotationRecord> {
        let (begin, end) = position.offsets();
        self.records_in(position.layer())
            .filter(|r| r.covers(begin, end))
            .filter(|r| !position.is_relation() || self.position_of(r).as_ref() == Some(position))
            .collect()
    }

    /// Ids of all records at a position.
    pub fn ids_at(&self, position: &Position) -> Vec<RecordId> {
        self.at_position(position).iter().map(|r| r.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::layer::Feature;

    fn schema() -> Schema {
        Schema::new()
            .with_layer(AnnotationLayer::span("Token"))
            .with_layer(
                AnnotationLayer::span("Event")
                    .with_feature(Feature::primitive("value"))
                    .with_feature(Feature::slot("args", "Token")),
            )
            .with_layer(
                AnnotationLayer::relation("Dependency", "Governor", "Dependent")
                    .with_feature(Feature::primitive("DependencyType")),
            )
    }

    #[test]
    fn test_relation_takes_target_offsets() {
        let mut set = AnnotationSet::new("anna", "doc1", schema());
        let gov = set.add_span("Token", 0, 3).unwrap();
        let dep = set.add_span("Token", 4, 9).unwrap();
        let rel = set.add_relation("Dependency", gov, dep).unwrap();

        let record = set.record(rel).unwrap();
        assert_eq!((record.begin, record.end), (4, 9));
        assert_eq!(
            set.position_of(record),
            Some(Position::relation("Dependency", (0, 3), (4, 9)))
        );
    }

    #[test]
    fn test_add_relation_rejects_span_layer() {
        let mut set = AnnotationSet::new("anna", "doc1", schema());
        let a = set.add_span("Token", 0, 3).unwrap();
        let result = set.add_relation("Token", a, a);
        assert!(matches!(result, Err(CurationError::UnsupportedLayer { .. })));
    }

    #[test]
    fn test_at_position_matches_relations_by_endpoints() {
        let mut set = AnnotationSet::new("anna", "doc1", schema());
        let a = set.add_span("Token", 0, 3).unwrap();
        let b = set.add_span("Token", 4, 9).unwrap();
        let c = set.add_span("Token", 10, 12).unwrap();
        set.add_relation("Dependency", a, b).unwrap();
        set.add_relation("Dependency", c, b).unwrap();

        let pos = Position::relation("Dependency", (10, 12), (4, 9));
        assert_eq!(set.at_position(&pos).len(), 1);
    }

    #[test]
    fn test_remove_cascading_cleans_references() {
        let mut set = AnnotationSet::new("anna", "doc1", schema());
        let a = set.add_span("Token", 0, 3).unwrap();
        let b = set.add_span("Token", 4, 9).unwrap();
        let rel = set.add_relation("Dependency", a, b).unwrap();
        let event = set.add_span("Event", 0, 9).unwrap();
        set.push_link(event, "args", Link::new("agent", a)).unwrap();
        set.push_link(event, "args", Link::new("theme", b)).unwrap();

        let removed = set.remove_cascading(a);

        assert_eq!(removed, vec![a, rel]);
        assert!(set.record(rel).is_none());
        assert_eq!(set.record(event).unwrap().links("args"), &[Link::new("theme", b)]);
    }

    #[test]
    fn test_window_containment() {
        let window = TextWindow::new(0, 100);
        assert!(window.contains(10, 15));
        assert!(window.contains(0, 100));
        assert!(!window.contains(95, 101));
        assert!(TextWindow::unbounded().contains(0, usize::MAX));
    }
}
