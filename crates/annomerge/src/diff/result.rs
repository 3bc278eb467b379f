//! Diff results and summaries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{AnnotationLayer, AnnotatorId, Position, RecordId, TextWindow};

use super::configuration::{ConfigurationSet, PositionState};

/// Why part of a diff was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Annotation sets disagree on a layer's features.
    SchemaMismatch,
    /// The layer is not diffable (chain layers).
    UnsupportedLayer,
    /// No annotation set knows the layer.
    UnknownLayer,
    /// A record's references could not be resolved.
    DanglingReference,
}

/// A problem recovered from while diffing.
///
/// The affected positions are excluded; the rest of the window still
/// produces a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffIssue {
    pub kind: IssueKind,

    pub layer: String,

    /// Human-readable description.
    pub message: String,

    /// Annotators involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotators: Vec<AnnotatorId>,

    /// Positions left out of the result because of this issue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<Position>,

    /// Records left out because of this issue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordId>,
}

/// An annotator whose snapshot could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableAnnotator {
    pub annotator: AnnotatorId,
    pub reason: String,
}

/// Counts of positions by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub agreed: usize,
    pub disagreed: usize,
    pub incomplete: usize,
    pub stacked: usize,
}

impl StateCounts {
    /// Create new counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one position.
    pub fn add(&mut self, state: PositionState) {
        match state {
            PositionState::Agreed => self.agreed += 1,
            PositionState::Disagreed => self.disagreed += 1,
            PositionState::Incomplete => self.incomplete += 1,
            PositionState::Stacked => self.stacked += 1,
        }
    }

    /// Total number of positions.
    pub fn total(&self) -> usize {
        self.agreed + self.disagreed + self.incomplete + self.stacked
    }

    /// Positions that were scored (incomplete positions are not).
    pub fn scored(&self) -> usize {
        self.agreed + self.disagreed + self.stacked
    }

    /// Share of scored positions that agree (0.0 to 1.0).
    pub fn agreement_ratio(&self) -> f64 {
        if self.scored() == 0 {
            return 1.0;
        }
        self.agreed as f64 / self.scored() as f64
    }
}

/// Summary of a diff for UI badges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Counts over all layers.
    pub total: StateCounts,

    /// Counts per layer.
    pub by_layer: IndexMap<String, StateCounts>,

    /// Positions excluded because of issues.
    pub excluded: usize,
}

/// The outcome of diffing a set of annotators over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Annotators diffed, sorted.
    pub(crate) annotators: Vec<AnnotatorId>,

    /// Definitions of the layers that were compared.
    pub(crate) layers: IndexMap<String, AnnotationLayer>,

    pub(crate) window: TextWindow,

    /// Configuration sets by position, sorted.
    #[serde(with = "indexmap::map::serde_seq")]
    pub(crate) positions: IndexMap<Position, ConfigurationSet>,

    pub(crate) issues: Vec<DiffIssue>,

    #[serde(default)]
    pub(crate) unavailable: Vec<UnavailableAnnotator>,
}

impl DiffResult {
    /// Annotators diffed, sorted.
    pub fn annotators(&self) -> &[AnnotatorId] {
        &self.annotators
    }

    /// Definitions of the layers that were compared.
    pub fn layers(&self) -> impl Iterator<Item = &AnnotationLayer> {
        self.layers.values()
    }

    /// Definition of a compared layer.
    pub fn layer(&self, name: &str) -> Option<&AnnotationLayer> {
        self.layers.get(name)
    }

    /// Check if a layer was compared.
    pub fn covers_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Check if a record at `[begin, end)` on `layer` is in scope.
    pub fn in_scope(&self, layer: &str, begin: usize, end: usize) -> bool {
        self.covers_layer(layer) && self.window.contains(begin, end)
    }

    /// The window that was diffed.
    pub fn window(&self) -> TextWindow {
        self.window
    }

    /// Iterate over all configuration sets in position order.
    pub fn positions(&self) -> impl Iterator<Item = &ConfigurationSet> {
        self.positions.values()
    }

    /// The configuration set of a position.
    pub fn configuration_set(&self, position: &Position) -> Option<&ConfigurationSet> {
        self.positions.get(position)
    }

    /// Agreement state of a position, if it was diffed.
    pub fn state_of(&self, position: &Position) -> Option<PositionState> {
        self.positions.get(position).map(ConfigurationSet::state)
    }

    /// Positions where all annotators agree.
    pub fn agreeing(&self) -> impl Iterator<Item = &ConfigurationSet> {
        self.positions().filter(|s| s.state() == PositionState::Agreed)
    }

    /// Complete positions that disagree or are stacked.
    pub fn differing(&self) -> impl Iterator<Item = &ConfigurationSet> {
        self.positions().filter(|s| {
            matches!(s.state(), PositionState::Disagreed | PositionState::Stacked)
        })
    }

    /// Positions some annotator has no record at.
    pub fn incomplete(&self) -> impl Iterator<Item = &ConfigurationSet> {
        self.positions().filter(|s| s.incomplete)
    }

    /// Problems recovered from while diffing.
    pub fn issues(&self) -> &[DiffIssue] {
        &self.issues
    }

    /// Annotators that could not be read.
    pub fn unavailable(&self) -> &[UnavailableAnnotator] {
        &self.unavailable
    }

    /// Attach annotators that could not be read.
    pub fn with_unavailable(mut self, unavailable: Vec<UnavailableAnnotator>) -> Self {
        self.unavailable = unavailable;
        self
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if no position was diffed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check if any position is not agreed.
    pub fn has_differences(&self) -> bool {
        self.positions().any(|s| s.state() != PositionState::Agreed)
    }

    /// Count positions by state, overall and per layer.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for name in self.layers.keys() {
            summary.by_layer.insert(name.clone(), StateCounts::new());
        }

        for set in self.positions() {
            let state = set.state();
            summary.total.add(state);
            summary
                .by_layer
                .entry(set.position.layer().to_string())
                .or_default()
                .add(state);
        }

        summary.excluded = self.issues.iter().map(|i| i.excluded.len()).sum();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_counts() {
        let mut counts = StateCounts::new();
        counts.add(PositionState::Agreed);
        counts.add(PositionState::Agreed);
        counts.add(PositionState::Agreed);
        counts.add(PositionState::Disagreed);
        counts.add(PositionState::Incomplete);

        assert_eq!(counts.total(), 5);
        assert_eq!(counts.scored(), 4);
        assert!((counts.agreement_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_counts_ratio() {
        assert!((StateCounts::new().agreement_ratio() - 1.0).abs() < f64::EPSILON);
    }
}
