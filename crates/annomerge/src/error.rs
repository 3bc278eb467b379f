//! Error types for the annomerge library.

use thiserror::Error;

use crate::model::{AnnotatorId, Position, RecordId};

/// Which end of a relation an endpoint error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSide {
    Source,
    Target,
}

impl std::fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointSide::Source => f.write_str("source"),
            EndpointSide::Target => f.write_str("target"),
        }
    }
}

/// Main error type for diff and merge operations.
#[derive(Debug, Error)]
pub enum CurationError {
    /// Two annotation sets disagree on the feature definitions of a layer.
    #[error("Schema mismatch on layer '{layer}' between annotators {annotators:?}")]
    SchemaMismatch {
        layer: String,
        annotators: Vec<AnnotatorId>,
    },

    /// An equal annotation already exists at the position.
    #[error("An identical annotation already exists at {position}")]
    DuplicateAnnotation { position: Position },

    /// A relation endpoint has no counterpart in the curator set.
    #[error("No {side} endpoint found in the curator set at {position}")]
    MissingEndpoint {
        position: Position,
        side: EndpointSide,
    },

    /// A relation endpoint has several stacked counterparts in the curator set.
    #[error("{candidates} stacked {side} endpoint candidates at {position}; resolve the stacking first")]
    AmbiguousEndpoint {
        position: Position,
        side: EndpointSide,
        candidates: usize,
    },

    /// The annotation carrying a slot link does not exist in the curator set.
    #[error("Base annotation at {position} does not exist in the curator set")]
    MissingBaseAnnotation { position: Position },

    /// The layer is not known to the schema.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// The layer exists but cannot take part in diffing.
    #[error("Layer '{layer}' of kind '{kind}' is not supported for diffing")]
    UnsupportedLayer { layer: String, kind: String },

    /// A record id does not exist in the given annotation set.
    #[error("Record {record} not found in the annotations of '{annotator}'")]
    UnknownRecord {
        annotator: AnnotatorId,
        record: RecordId,
    },

    /// The feature is not a slot-link feature of the layer.
    #[error("Feature '{feature}' of layer '{layer}' is not a slot feature")]
    NotASlotFeature { layer: String, feature: String },

    /// A slot link index is past the end of the link array.
    #[error("Link index {index} out of range for feature '{feature}' ({len} links)")]
    LinkIndexOutOfRange {
        feature: String,
        index: usize,
        len: usize,
    },

    /// A collaborator could not supply an annotator's snapshot.
    #[error("Annotator '{annotator}' unavailable: {reason}")]
    AnnotatorUnavailable {
        annotator: AnnotatorId,
        reason: String,
    },
}

impl CurationError {
    /// Whether the error must be shown to the curator as-is.
    ///
    /// These are the outcomes of an accept/copy request that could not be
    /// completed. They are never retried automatically.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            CurationError::DuplicateAnnotation { .. }
                | CurationError::MissingEndpoint { .. }
                | CurationError::AmbiguousEndpoint { .. }
                | CurationError::MissingBaseAnnotation { .. }
        )
    }
}

/// Result type alias for annomerge operations.
pub type Result<T> = std::result::Result<T, CurationError>;
