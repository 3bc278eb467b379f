//! Outcomes of merge passes and copy operations.

use serde::{Deserialize, Serialize};

use crate::model::{Position, RecordId};

/// Whether a copy created a new curator record or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeState {
    Created,
    Updated,
}

/// Result of a successful copy or accept operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub state: MergeState,

    /// The curator record that was created or updated.
    pub record: RecordId,
}

impl MergeOutcome {
    pub(crate) fn created(record: RecordId) -> Self {
        Self {
            state: MergeState::Created,
            record,
        }
    }

    pub(crate) fn updated(record: RecordId) -> Self {
        Self {
            state: MergeState::Updated,
            record,
        }
    }
}

/// A position skipped because the curator set's schema lags behind.
///
/// Never an error: the curator set catches up on a later pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleSchemaWarning {
    pub position: Position,
    pub layer: String,
    pub message: String,
}

/// What a merge pass changed in the curator set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Records created.
    pub created: usize,

    /// Records whose slot links were pruned.
    pub updated: usize,

    /// Records deleted, including cascaded relations.
    pub deleted: usize,

    /// Slot links removed or not carried over.
    pub links_dropped: usize,

    /// Positions that could not be merged (stale schema, unresolvable endpoints).
    pub skipped: usize,

    /// Stale-schema warnings, one per skipped position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StaleSchemaWarning>,
}

impl MergeReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the pass left the curator set untouched.
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0 && self.links_dropped == 0
    }

    /// Check if any position was skipped for a stale schema.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
