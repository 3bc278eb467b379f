//! Contracts for the external collaborators the engine consumes.
//!
//! The engine never performs I/O itself. Schema lookup, annotator snapshots
//! and curator persistence are supplied through these traits. In-memory
//! implementations are provided for embedding and tests.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::error::{CurationError, Result};
use crate::merge::MergedAnnotationSet;
use crate::model::{AnnotationLayer, AnnotationSet, AnnotatorId, Feature, Schema, TextWindow};

/// Access to layer and feature definitions.
pub trait AnnotationSchemaLookup {
    /// Look up a layer by name.
    fn layer_by_name(&self, name: &str) -> Result<&AnnotationLayer>;

    /// Feature definitions of a layer.
    fn features_of<'a>(&self, layer: &'a AnnotationLayer) -> &'a [Feature] {
        &layer.features
    }
}

impl AnnotationSchemaLookup for Schema {
    fn layer_by_name(&self, name: &str) -> Result<&AnnotationLayer> {
        self.require(name)
    }
}

/// Supplies per-annotator snapshots of a document.
///
/// Each returned set must be a consistent snapshot that is not mutated
/// while the engine reads it.
pub trait AnnotatorDocumentProvider {
    /// Annotators whose work on `document` should be diffed.
    fn annotators(&self, document: &str) -> Vec<AnnotatorId>;

    /// Read one annotator's annotations.
    fn read_annotations(
        &self,
        annotator: &AnnotatorId,
        document: &str,
        layers: &[String],
        window: TextWindow,
    ) -> Result<AnnotationSet>;
}

/// Persists the curator's working set.
pub trait CuratorDocumentStore {
    /// Load the curator set of a document, if one was saved.
    fn load(&self, document: &str) -> Result<Option<MergedAnnotationSet>>;

    /// Save the curator set of a document.
    fn save(&mut self, document: &str, set: &MergedAnnotationSet) -> Result<()>;
}

/// Document provider backed by in-memory annotation sets.
///
/// Returns complete snapshots; the position indexer applies the layer
/// allow-list and the window.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentProvider {
    documents: HashMap<String, IndexMap<AnnotatorId, AnnotationSet>>,
    unavailable: HashSet<AnnotatorId>,
}

impl InMemoryDocumentProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotator's set, keyed by its document and annotator.
    pub fn with_set(mut self, set: AnnotationSet) -> Self {
        self.insert(set);
        self
    }

    /// Add or replace an annotator's set.
    pub fn insert(&mut self, set: AnnotationSet) {
        self.documents
            .entry(set.document.clone())
            .or_default()
            .insert(set.annotator.clone(), set);
    }

    /// Make reads for an annotator fail, simulating an unreadable store.
    pub fn mark_unavailable(&mut self, annotator: impl Into<AnnotatorId>) {
        self.unavailable.insert(annotator.into());
    }
}

impl AnnotatorDocumentProvider for InMemoryDocumentProvider {
    fn annotators(&self, document: &str) -> Vec<AnnotatorId> {
        self.documents
            .get(document)
            .map(|sets| sets.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_annotations(
        &self,
        annotator: &AnnotatorId,
        document: &str,
        _layers: &[String],
        _window: TextWindow,
    ) -> Result<AnnotationSet> {
        if self.unavailable.contains(annotator) {
            return Err(CurationError::AnnotatorUnavailable {
                annotator: annotator.clone(),
                reason: "store marked unavailable".to_string(),
            });
        }

        self.documents
            .get(document)
            .and_then(|sets| sets.get(annotator))
            .cloned()
            .ok_or_else(|| CurationError::AnnotatorUnavailable {
                annotator: annotator.clone(),
                reason: format!("no annotations for document '{}'", document),
            })
    }
}

/// Curator store keeping sets in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCuratorStore {
    sets: HashMap<String, MergedAnnotationSet>,
}

impl InMemoryCuratorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Check if nothing has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl CuratorDocumentStore for InMemoryCuratorStore {
    fn load(&self, document: &str) -> Result<Option<MergedAnnotationSet>> {
        Ok(self.sets.get(document).cloned())
    }

    fn save(&mut self, document: &str, set: &MergedAnnotationSet) -> Result<()> {
        self.sets.insert(document.to_string(), set.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new().with_layer(AnnotationLayer::span("NE"))
    }

    #[test]
    fn test_schema_lookup_trait() {
        let schema = schema();
        let layer = schema.layer_by_name("NE").unwrap();
        assert!(schema.features_of(layer).is_empty());
        assert!(schema.layer_by_name("POS").is_err());
    }

    #[test]
    fn test_provider_lists_annotators_in_insertion_order() {
        let provider = InMemoryDocumentProvider::new()
            .with_set(AnnotationSet::new("bea", "doc1", schema()))
            .with_set(AnnotationSet::new("anna", "doc1", schema()))
            .with_set(AnnotationSet::new("carl", "doc2", schema()));

        assert_eq!(
            provider.annotators("doc1"),
            vec![AnnotatorId::from("bea"), AnnotatorId::from("anna")]
        );
        assert!(provider.annotators("doc3").is_empty());
    }

    #[test]
    fn test_provider_reports_unavailable_annotator() {
        let mut provider =
            InMemoryDocumentProvider::new().with_set(AnnotationSet::new("anna", "doc1", schema()));
        provider.mark_unavailable("anna");

        let result = provider.read_annotations(
            &AnnotatorId::from("anna"),
            "doc1",
            &[],
            TextWindow::unbounded(),
        );
        assert!(matches!(result, Err(CurationError::AnnotatorUnavailable { .. })));
    }
}
