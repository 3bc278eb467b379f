//! Annotation data model: layers, records, per-annotator sets and positions.

mod layer;
mod position;
mod record;
mod set;

pub use layer::{AnnotationLayer, Feature, FeatureKind, LayerKind, Schema};
pub use position::Position;
pub use record::{AnnotationRecord, FeatureValue, Link, RecordId};
pub use set::{AnnotationSet, AnnotatorId, SourceRecord, TextWindow};
