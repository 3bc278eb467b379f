//! Offset-based comparison keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical key used to align annotations from different annotators.
///
/// Equality is computed from the layer name and offsets only, never from
/// record identity, so independently created records at the same text
/// location compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Position {
    /// A span annotation.
    Span {
        layer: String,
        begin: usize,
        end: usize,
    },
    /// A relation annotation, keyed by both endpoints.
    Relation {
        layer: String,
        source_begin: usize,
        source_end: usize,
        target_begin: usize,
        target_end: usize,
    },
}

impl Position {
    /// Create a span position.
    pub fn span(layer: impl Into<String>, begin: usize, end: usize) -> Self {
        Position::Span {
            layer: layer.into(),
            begin,
            end,
        }
    }

    /// Create a relation position from source and target offsets.
    pub fn relation(
        layer: impl Into<String>,
        source: (usize, usize),
        target: (usize, usize),
    ) -> Self {
        Position::Relation {
            layer: layer.into(),
            source_begin: source.0,
            source_end: source.1,
            target_begin: target.0,
            target_end: target.1,
        }
    }

    /// Name of the layer this position belongs to.
    pub fn layer(&self) -> &str {
        match self {
            Position::Span { layer, .. } | Position::Relation { layer, .. } => layer,
        }
    }

    /// Whether this is a relation position.
    pub fn is_relation(&self) -> bool {
        matches!(self, Position::Relation { .. })
    }

    /// Begin/end offsets of the annotated text.
    ///
    /// Relations report their target side.
    pub fn offsets(&self) -> (usize, usize) {
        match self {
            Position::Span { begin, end, .. } => (*begin, *end),
            Position::Relation {
                target_begin,
                target_end,
                ..
            } => (*target_begin, *target_end),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Span { layer, begin, end } => write!(f, "{}[{},{})", layer, begin, end),
            Position::Relation {
                layer,
                source_begin,
                source_end,
                target_begin,
                target_end,
            } => write!(
                f,
                "{}[{},{})->[{},{})",
                layer, source_begin, source_end, target_begin, target_end
            ),
        }
    }
}
