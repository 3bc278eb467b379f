//! Annotation records and feature values.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Identity of a record within one annotation set.
///
/// Ids are never compared across sets; cross-set alignment always goes
/// through [`Position`](super::Position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One slot link: a role and a set-local reference to the filler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub role: String,
    pub target: RecordId,
}

impl Link {
    pub fn new(role: impl Into<String>, target: RecordId) -> Self {
        Self {
            role: role.into(),
            target,
        }
    }
}

/// A feature value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    /// Missing value. Equal only to itself.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrArray(Vec<String>),
    /// Slot links.
    Links(Vec<Link>),
    /// Reference to another record in the same set.
    Ref(RecordId),
}

impl FeatureValue {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Null)
    }

    /// Get the slot links, if this is a link array.
    pub fn as_links(&self) -> Option<&[Link]> {
        match self {
            FeatureValue::Links(links) => Some(links),
            _ => None,
        }
    }

    /// Get the referenced record, if this is a reference.
    pub fn as_ref_id(&self) -> Option<RecordId> {
        match self {
            FeatureValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render as plain JSON for audit snapshots.
    ///
    /// Links and references are rendered with their set-local ids.
    pub fn to_json(&self) -> Value {
        match self {
            FeatureValue::Null => Value::Null,
            FeatureValue::Bool(b) => json!(b),
            FeatureValue::Int(i) => json!(i),
            FeatureValue::Float(f) => json!(f),
            FeatureValue::Str(s) => json!(s),
            FeatureValue::StrArray(values) => json!(values),
            FeatureValue::Links(links) => Value::Array(
                links
                    .iter()
                    .map(|l| json!({ "role": l.role, "target": l.target.0 }))
                    .collect(),
            ),
            FeatureValue::Ref(id) => json!({ "ref": id.0 }),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Str(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Str(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Bool(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Int(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value)
    }
}

impl From<Vec<Link>> for FeatureValue {
    fn from(links: Vec<Link>) -> Self {
        FeatureValue::Links(links)
    }
}

/// One concrete annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Identity within the owning set.
    pub id: RecordId,

    /// Name of the layer.
    pub layer: String,

    /// Begin offset (for relations, of the target side).
    pub begin: usize,

    /// End offset (for relations, of the target side).
    pub end: usize,

    /// Feature values by name. Absent features read as null.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub features: IndexMap<String, FeatureValue>,
}

impl AnnotationRecord {
    /// Get a feature value, treating absent features as null.
    pub fn feature(&self, name: &str) -> &FeatureValue {
        static NULL: FeatureValue = FeatureValue::Null;
        self.features.get(name).unwrap_or(&NULL)
    }

    /// Get the slot links of a feature, empty if unset.
    pub fn links(&self, feature: &str) -> &[Link] {
        self.feature(feature).as_links().unwrap_or(&[])
    }

    /// Check if the record covers `[begin, end)` exactly.
    pub fn covers(&self, begin: usize, end: usize) -> bool {
        self.begin == begin && self.end == end
    }

    /// Snapshot of the features as JSON.
    pub fn features_json(&self) -> Value {
        Value::Object(
            self.features
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AnnotationRecord {
        let mut features = IndexMap::new();
        features.insert("value".to_string(), FeatureValue::from("ORG"));
        features.insert(
            "args".to_string(),
            FeatureValue::Links(vec![Link::new("agent", RecordId(4))]),
        );
        AnnotationRecord {
            id: RecordId(1),
            layer: "NE".into(),
            begin: 10,
            end: 15,
            features,
        }
    }

    #[test]
    fn test_absent_feature_is_null() {
        let rec = record();
        assert!(rec.feature("identifier").is_null());
        assert_eq!(rec.feature("value").as_str(), Some("ORG"));
    }

    #[test]
    fn test_null_equals_only_null() {
        assert_eq!(FeatureValue::Null, FeatureValue::Null);
        assert_ne!(FeatureValue::Null, FeatureValue::from(""));
        assert_ne!(FeatureValue::Int(1), FeatureValue::Float(1.0));
    }

    #[test]
    fn test_links_accessor() {
        let rec = record();
        assert_eq!(rec.links("args").len(), 1);
        assert!(rec.links("value").is_empty());
        assert!(rec.links("missing").is_empty());
    }

    #[test]
    fn test_features_json_snapshot() {
        let rec = record();
        assert_eq!(
            rec.features_json(),
            json!({
                "value": "ORG",
                "args": [{ "role": "agent", "target": 4 }]
            })
        );
    }
}
