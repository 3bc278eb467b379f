//! Layer and feature definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CurationError, Result};

/// Category of an annotation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    /// Annotations over a text range.
    Span,
    /// Directed arcs between two annotations.
    ///
    /// The endpoints are stored as reference features with these names.
    Relation {
        source_feature: String,
        target_feature: String,
    },
    /// Coreference-style chain links. Never diffed.
    Chain,
}

impl LayerKind {
    /// Get a short label.
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Span => "span",
            LayerKind::Relation { .. } => "relation",
            LayerKind::Chain => "chain",
        }
    }
}

/// Kind of value a feature holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    /// A scalar (string, number, boolean).
    Primitive,
    /// A list of strings.
    StringArray,
    /// An ordered list of (role, target) links into `target_layer`.
    SlotLink { target_layer: String },
    /// A reference to another annotation (relation endpoints).
    Reference,
}

/// A feature definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name.
    pub name: String,
    /// Value kind.
    pub kind: FeatureKind,
}

impl Feature {
    /// A scalar feature.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Primitive,
        }
    }

    /// A string-array feature.
    pub fn string_array(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::StringArray,
        }
    }

    /// A slot-link feature pointing into `target_layer`.
    pub fn slot(name: impl Into<String>, target_layer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::SlotLink {
                target_layer: target_layer.into(),
            },
        }
    }

    /// A reference feature.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Reference,
        }
    }

    /// Check if this is a slot-link feature.
    pub fn is_slot(&self) -> bool {
        matches!(self.kind, FeatureKind::SlotLink { .. })
    }
}

/// Schema for one kind of annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationLayer {
    /// Layer name (e.g., "NamedEntity").
    pub name: String,
    /// Layer category.
    pub kind: LayerKind,
    /// Ordered feature definitions.
    pub features: Vec<Feature>,
}

impl AnnotationLayer {
    /// Create a span layer with no features.
    pub fn span(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Span,
            features: Vec::new(),
        }
    }

    /// Create a relation layer.
    ///
    /// Reference features for both endpoints are added automatically.
    pub fn relation(
        name: impl Into<String>,
        source_feature: impl Into<String>,
        target_feature: impl Into<String>,
    ) -> Self {
        let source_feature = source_feature.into();
        let target_feature = target_feature.into();
        Self {
            name: name.into(),
            features: vec![
                Feature::reference(source_feature.clone()),
                Feature::reference(target_feature.clone()),
            ],
            kind: LayerKind::Relation {
                source_feature,
                target_feature,
            },
        }
    }

    /// Create a chain layer.
    pub fn chain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Chain,
            features: Vec::new(),
        }
    }

    /// Add a feature definition.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Look up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Check if this is a relation layer.
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, LayerKind::Relation { .. })
    }

    /// Names of the relation endpoint features, if this is a relation layer.
    pub fn endpoint_features(&self) -> Option<(&str, &str)> {
        match &self.kind {
            LayerKind::Relation {
                source_feature,
                target_feature,
            } => Some((source_feature, target_feature)),
            _ => None,
        }
    }

    /// Features compared by value: everything except relation endpoints.
    pub fn value_features(&self) -> impl Iterator<Item = &Feature> {
        let endpoints = self.endpoint_features();
        self.features.iter().filter(move |f| match endpoints {
            Some((source, target)) => f.name != source && f.name != target,
            None => true,
        })
    }

    /// Slot-link features of this layer.
    pub fn slot_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.is_slot())
    }

    /// Whether two definitions describe the same type.
    ///
    /// Feature order is ignored; names and kinds must match exactly.
    pub fn is_compatible_with(&self, other: &AnnotationLayer) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.features.len() == other.features.len()
            && self
                .features
                .iter()
                .all(|f| other.feature(&f.name) == Some(f))
    }
}

/// An ordered collection of layer definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    layers: IndexMap<String, AnnotationLayer>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer definition, replacing any layer with the same name.
    pub fn with_layer(mut self, layer: AnnotationLayer) -> Self {
        self.insert(layer);
        self
    }

    /// Insert a layer definition, replacing any layer with the same name.
    pub fn insert(&mut self, layer: AnnotationLayer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    /// Look up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&AnnotationLayer> {
        self.layers.get(name)
    }

    /// Look up a layer by name, failing if unknown.
    pub fn require(&self, name: &str) -> Result<&AnnotationLayer> {
        self.layer(name)
            .ok_or_else(|| CurationError::UnknownLayer(name.to_string()))
    }

    /// Iterate over all layers in insertion order.
    pub fn layers(&self) -> impl Iterator<Item = &AnnotationLayer> {
        self.layers.values()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the schema has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependency() -> AnnotationLayer {
        AnnotationLayer::relation("Dependency", "Governor", "Dependent")
            .with_feature(Feature::primitive("DependencyType"))
    }

    #[test]
    fn test_relation_layer_has_endpoint_features() {
        let layer = dependency();

        assert_eq!(layer.endpoint_features(), Some(("Governor", "Dependent")));
        assert_eq!(layer.feature("Governor").map(|f| &f.kind), Some(&FeatureKind::Reference));

        let compared: Vec<_> = layer.value_features().map(|f| f.name.as_str()).collect();
        assert_eq!(compared, vec!["DependencyType"]);
    }

    #[test]
    fn test_compatibility_ignores_feature_order() {
        let a = AnnotationLayer::span("NE")
            .with_feature(Feature::primitive("value"))
            .with_feature(Feature::primitive("identifier"));
        let b = AnnotationLayer::span("NE")
            .with_feature(Feature::primitive("identifier"))
            .with_feature(Feature::primitive("value"));

        assert!(a.is_compatible_with(&b));
    }

    #[test]
    fn test_compatibility_detects_drift() {
        let a = AnnotationLayer::span("NE").with_feature(Feature::primitive("value"));
        let b = AnnotationLayer::span("NE").with_feature(Feature::string_array("value"));
        let c = AnnotationLayer::span("NE");

        assert!(!a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new()
            .with_layer(AnnotationLayer::span("NE"))
            .with_layer(dependency());

        assert_eq!(schema.len(), 2);
        assert!(schema.layer("NE").is_some());
        assert!(matches!(
            schema.require("Missing"),
            Err(CurationError::UnknownLayer(name)) if name == "Missing"
        ));
    }
}
