//! Position indexer: aligns records from all annotators by position.

use indexmap::IndexMap;
use tracing::warn;

use crate::model::{AnnotationRecord, AnnotationSet, AnnotatorId, Position, RecordId, TextWindow};

/// Records grouped by position, then by annotator.
///
/// Pure function of its inputs; the index borrows the sets it was built
/// from and never mutates them.
#[derive(Debug)]
pub struct PositionIndex<'a> {
    sets: IndexMap<AnnotatorId, &'a AnnotationSet>,
    entries: IndexMap<Position, IndexMap<AnnotatorId, Vec<&'a AnnotationRecord>>>,
    dangling: Vec<(AnnotatorId, RecordId)>,
}

impl<'a> PositionIndex<'a> {
    /// Index the records of `layers` that lie inside `window`.
    ///
    /// Relations are keyed by the offsets of their endpoints; relations whose
    /// endpoints do not resolve are left out and reported by
    /// [`dangling`](Self::dangling).
    pub fn build(sets: &[&'a AnnotationSet], layers: &[String], window: TextWindow) -> Self {
        let mut index = Self {
            sets: IndexMap::new(),
            entries: IndexMap::new(),
            dangling: Vec::new(),
        };

        for &set in sets {
            index.sets.insert(set.annotator.clone(), set);

            for record in set.records() {
                if !layers.iter().any(|l| *l == record.layer) {
                    continue;
                }
                if !window.contains(record.begin, record.end) {
                    continue;
                }

                match set.position_of(record) {
                    Some(position) => index
                        .entries
                        .entry(position)
                        .or_default()
                        .entry(set.annotator.clone())
                        .or_default()
                        .push(record),
                    None => {
                        warn!(
                            annotator = %set.annotator,
                            record = %record.id,
                            layer = %record.layer,
                            "Skipping record with unresolved endpoint"
                        );
                        index.dangling.push((set.annotator.clone(), record.id));
                    }
                }
            }
        }

        index.entries.sort_keys();
        index
    }

    /// Annotators whose sets were indexed, in input order.
    pub fn annotators(&self) -> impl Iterator<Item = &AnnotatorId> {
        self.sets.keys()
    }

    /// The set of an annotator.
    pub fn set(&self, annotator: &AnnotatorId) -> Option<&'a AnnotationSet> {
        self.sets.get(annotator).copied()
    }

    /// Iterate over positions in sorted order.
    pub fn positions(&self) -> impl Iterator<Item = (&Position, &IndexMap<AnnotatorId, Vec<&'a AnnotationRecord>>)> {
        self.entries.iter()
    }

    /// Records at a position, by annotator.
    pub fn at(&self, position: &Position) -> Option<&IndexMap<AnnotatorId, Vec<&'a AnnotationRecord>>> {
        self.entries.get(position)
    }

    /// Records skipped because a reference did not resolve.
    pub fn dangling(&self) -> &[(AnnotatorId, RecordId)] {
        &self.dangling
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no position was found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationLayer, Schema};

    fn schema() -> Schema {
        Schema::new()
            .with_layer(AnnotationLayer::span("Token"))
            .with_layer(AnnotationLayer::span("NE"))
            .with_layer(AnnotationLayer::relation("Dependency", "Governor", "Dependent"))
    }

    fn layers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_groups_spans_by_offsets_across_annotators() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        a.add_span("NE", 10, 15).unwrap();
        let mut b = AnnotationSet::new("b", "doc", schema());
        b.add_span("NE", 10, 15).unwrap();
        b.add_span("NE", 20, 25).unwrap();

        let index = PositionIndex::build(&[&a, &b], &layers(&["NE"]), TextWindow::new(0, 100));

        assert_eq!(index.len(), 2);
        let at = index.at(&Position::span("NE", 10, 15)).unwrap();
        assert_eq!(at.len(), 2);
        let at = index.at(&Position::span("NE", 20, 25)).unwrap();
        assert_eq!(at.keys().collect::<Vec<_>>(), vec![&AnnotatorId::from("b")]);
    }

    #[test]
    fn test_respects_layer_allow_list_and_window() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        a.add_span("Token", 0, 3).unwrap();
        a.add_span("NE", 10, 15).unwrap();
        a.add_span("NE", 95, 105).unwrap();

        let index = PositionIndex::build(&[&a], &layers(&["NE"]), TextWindow::new(0, 100));

        let positions: Vec<_> = index.positions().map(|(p, _)| p.clone()).collect();
        assert_eq!(positions, vec![Position::span("NE", 10, 15)]);
    }

    #[test]
    fn test_relations_keyed_by_endpoints() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        let gov = a.add_span("Token", 0, 3).unwrap();
        let dep = a.add_span("Token", 4, 9).unwrap();
        a.add_relation("Dependency", gov, dep).unwrap();

        let index = PositionIndex::build(&[&a], &layers(&["Dependency"]), TextWindow::unbounded());

        assert!(index
            .at(&Position::relation("Dependency", (0, 3), (4, 9)))
            .is_some());
    }

    #[test]
    fn test_dangling_relation_is_reported() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        let gov = a.add_span("Token", 0, 3).unwrap();
        let dep = a.add_span("Token", 4, 9).unwrap();
        let rel = a.add_relation("Dependency", gov, dep).unwrap();
        a.remove(gov);

        let index = PositionIndex::build(&[&a], &layers(&["Dependency"]), TextWindow::unbounded());

        assert!(index.is_empty());
        assert_eq!(index.dangling(), &[(AnnotatorId::from("a"), rel)]);
    }
}
