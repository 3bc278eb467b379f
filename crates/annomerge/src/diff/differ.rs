//! The configuration differ.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::DiffConfig;
use crate::error::CurationError;
use crate::model::{AnnotationLayer, AnnotationRecord, AnnotationSet, AnnotatorId, LayerKind, Position, SourceRecord};

use super::compare::records_agree;
use super::configuration::{CandidateRecord, Configuration, ConfigurationSet};
use super::index::PositionIndex;
use super::result::{DiffIssue, DiffResult, IssueKind};

/// Computes configuration sets for every position of a window.
#[derive(Debug, Clone, Default)]
pub struct CasDiff {
    config: DiffConfig,
}

impl CasDiff {
    /// Create a differ for the given layers and window.
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Diff the given annotator sets.
    ///
    /// Structural problems never abort the pass: layers with mismatched
    /// definitions, unknown or chain layers and dangling references are
    /// reported in [`DiffResult::issues`] and the affected positions left out.
    /// The result does not depend on the order of `sets`.
    pub fn diff(&self, sets: &[&AnnotationSet]) -> DiffResult {
        let mut sets = sets.to_vec();
        sets.sort_by(|a, b| a.annotator.cmp(&b.annotator));
        let annotators: Vec<AnnotatorId> = sets.iter().map(|s| s.annotator.clone()).collect();

        let mut issues = Vec::new();
        let mut layers: IndexMap<String, AnnotationLayer> = IndexMap::new();
        let mut mismatched: IndexMap<String, usize> = IndexMap::new();

        for name in &self.config.layers {
            match resolve_layer(name, &sets) {
                Ok(layer) => {
                    layers.insert(name.clone(), layer.clone());
                }
                Err((err, involved)) => {
                    warn!(layer = %name, error = %err, "Excluding layer from diff");
                    let kind = match err {
                        CurationError::SchemaMismatch { .. } => {
                            mismatched.insert(name.clone(), issues.len());
                            IssueKind::SchemaMismatch
                        }
                        CurationError::UnsupportedLayer { .. } => IssueKind::UnsupportedLayer,
                        _ => IssueKind::UnknownLayer,
                    };
                    issues.push(DiffIssue {
                        kind,
                        layer: name.clone(),
                        message: err.to_string(),
                        annotators: involved,
                        excluded: Vec::new(),
                        records: Vec::new(),
                    });
                }
            }
        }

        let indexed: Vec<String> = layers.keys().chain(mismatched.keys()).cloned().collect();
        let index = PositionIndex::build(&sets, &indexed, self.config.window);
        report_dangling(&index, &mut issues);

        let mut positions = IndexMap::new();
        for (position, by_annotator) in index.positions() {
            if let Some(&issue) = mismatched.get(position.layer()) {
                issues[issue].excluded.push(position.clone());
                continue;
            }
            let Some(layer) = layers.get(position.layer()) else {
                continue;
            };
            let set = build_configuration_set(position, by_annotator, &index, layer, &annotators);
            positions.insert(position.clone(), set);
        }

        propagate_endpoint_disagreement(&mut positions, &layers);

        let result = DiffResult {
            annotators,
            layers,
            window: self.config.window,
            positions,
            issues,
            unavailable: Vec::new(),
        };

        let summary = result.summary();
        debug!(
            positions = result.len(),
            agreed = summary.total.agreed,
            disagreed = summary.total.disagreed,
            incomplete = summary.total.incomplete,
            stacked = summary.total.stacked,
            excluded = summary.excluded,
            "Diff complete"
        );

        result
    }
}

/// Find the single definition all sets share for a layer.
fn resolve_layer<'a>(
    name: &str,
    sets: &[&'a AnnotationSet],
) -> Result<&'a AnnotationLayer, (CurationError, Vec<AnnotatorId>)> {
    let mut reference: Option<(&AnnotatorId, &'a AnnotationLayer)> = None;
    let mut deviating = Vec::new();

    for &set in sets {
        match (set.schema().layer(name), reference) {
            (Some(layer), None) => reference = Some((&set.annotator, layer)),
            (Some(layer), Some((_, expected))) if layer.is_compatible_with(expected) => {}
            _ => deviating.push(set.annotator.clone()),
        }
    }

    let Some((owner, layer)) = reference else {
        return Err((CurationError::UnknownLayer(name.to_string()), Vec::new()));
    };

    if layer.kind == LayerKind::Chain {
        let err = CurationError::UnsupportedLayer {
            layer: name.to_string(),
            kind: layer.kind.label().to_string(),
        };
        return Err((err, Vec::new()));
    }

    if !deviating.is_empty() {
        let mut annotators = vec![owner.clone()];
        annotators.extend(deviating);
        let err = CurationError::SchemaMismatch {
            layer: name.to_string(),
            annotators: annotators.clone(),
        };
        return Err((err, annotators));
    }

    Ok(layer)
}

fn report_dangling(index: &PositionIndex<'_>, issues: &mut Vec<DiffIssue>) {
    let mut by_layer: IndexMap<String, DiffIssue> = IndexMap::new();

    for (annotator, id) in index.dangling() {
        let Some(record) = index.set(annotator).and_then(|s| s.record(*id)) else {
            continue;
        };
        let issue = by_layer.entry(record.layer.clone()).or_insert_with(|| DiffIssue {
            kind: IssueKind::DanglingReference,
            layer: record.layer.clone(),
            message: format!("Unresolved relation endpoints on layer '{}'", record.layer),
            annotators: Vec::new(),
            excluded: Vec::new(),
            records: Vec::new(),
        });
        if !issue.annotators.contains(annotator) {
            issue.annotators.push(annotator.clone());
        }
        issue.records.push(*id);
    }

    issues.extend(by_layer.into_values());
}

fn build_configuration_set(
    position: &Position,
    by_annotator: &IndexMap<AnnotatorId, Vec<&AnnotationRecord>>,
    index: &PositionIndex<'_>,
    layer: &AnnotationLayer,
    annotators: &[AnnotatorId],
) -> ConfigurationSet {
    let mut pending: Vec<(SourceRecord<'_>, Configuration)> = Vec::new();

    for (annotator, records) in by_annotator {
        let Some(set) = index.set(annotator) else {
            continue;
        };
        for &record in records {
            let source = SourceRecord { set, record };
            let candidate = CandidateRecord::from_source(source, layer);
            match pending
                .iter_mut()
                .find(|(representative, _)| records_agree(*representative, source))
            {
                Some((_, configuration)) => configuration.push(candidate),
                None => pending.push((source, Configuration::new(layer, candidate))),
            }
        }
    }

    let configurations: Vec<Configuration> = pending.into_iter().map(|(_, c)| c).collect();
    let mut contributors: Vec<AnnotatorId> = by_annotator.keys().cloned().collect();
    contributors.sort();

    let stacked = is_stacked(&configurations, &contributors);
    let incomplete = contributors.len() < annotators.len();

    ConfigurationSet {
        position: position.clone(),
        configurations,
        annotators: contributors,
        stacked,
        incomplete,
        endpoint_disagreement: false,
    }
}

/// A position with several records from one annotator is stacked if that
/// annotator's records split across configurations, if the contributors'
/// record counts differ, or if that annotator is the only contributor.
fn is_stacked(configurations: &[Configuration], contributors: &[AnnotatorId]) -> bool {
    let count = |annotator: &AnnotatorId| -> usize {
        configurations.iter().map(|c| c.record_count(annotator)).sum()
    };
    let counts: Vec<usize> = contributors.iter().map(count).collect();
    if counts.iter().all(|&n| n <= 1) {
        return false;
    }

    let spread = contributors
        .iter()
        .any(|annotator| configurations.iter().filter(|c| c.contains(annotator)).count() > 1);
    let uneven = counts.windows(2).any(|pair| pair[0] != pair[1]);
    spread || uneven || contributors.len() == 1
}

/// Demote agreeing relations whose endpoints do not agree.
///
/// Endpoints are checked one level deep against their own configuration
/// sets. Endpoints on layers that were not diffed are accepted as-is;
/// endpoints on diffed layers that are missing from the result (e.g.
/// outside the window) count as disagreement.
fn propagate_endpoint_disagreement(
    positions: &mut IndexMap<Position, ConfigurationSet>,
    layers: &IndexMap<String, AnnotationLayer>,
) {
    let endpoint_agrees = |endpoint: &Position| match positions.get(endpoint) {
        Some(set) => set.is_agreeing(),
        None => !layers.contains_key(endpoint.layer()),
    };

    let flagged: Vec<Position> = positions
        .values()
        .filter(|set| set.position.is_relation() && set.is_agreeing())
        .filter(|set| {
            let endpoints = set
                .configurations
                .first()
                .and_then(Configuration::representative)
                .and_then(|c| c.endpoints.as_ref());
            match endpoints {
                Some((source, target)) => !endpoint_agrees(source) || !endpoint_agrees(target),
                None => true,
            }
        })
        .map(|set| set.position.clone())
        .collect();

    for position in flagged {
        if let Some(set) = positions.get_mut(&position) {
            debug!(%position, "Relation endpoints disagree");
            set.endpoint_disagreement = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::PositionState;
    use crate::model::{Feature, Schema, TextWindow};

    fn schema() -> Schema {
        Schema::new()
            .with_layer(AnnotationLayer::span("NamedEntity").with_feature(Feature::primitive("value")))
            .with_layer(AnnotationLayer::chain("CoreferenceLink"))
    }

    fn entity(set: &mut AnnotationSet, begin: usize, end: usize, value: &str) {
        let id = set.add_span("NamedEntity", begin, end).unwrap();
        set.set_feature(id, "value", value).unwrap();
    }

    fn differ() -> CasDiff {
        CasDiff::new(
            DiffConfig::new()
                .with_layer("NamedEntity")
                .with_window(TextWindow::new(0, 100)),
        )
    }

    #[test]
    fn test_three_annotators_agree() {
        let mut sets = Vec::new();
        for name in ["anna", "bea", "carl"] {
            let mut set = AnnotationSet::new(name, "doc", schema());
            entity(&mut set, 10, 15, "ORG");
            sets.push(set);
        }
        let refs: Vec<&AnnotationSet> = sets.iter().collect();

        let result = differ().diff(&refs);

        assert_eq!(result.len(), 1);
        let set = result
            .configuration_set(&Position::span("NamedEntity", 10, 15))
            .unwrap();
        assert_eq!(set.configurations.len(), 1);
        assert_eq!(set.configurations[0].annotators().count(), 3);
        assert!(!set.has_differences());
        assert_eq!(set.state(), PositionState::Agreed);
    }

    #[test]
    fn test_two_values_disagree() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");
        let mut b = AnnotationSet::new("b", "doc", schema());
        entity(&mut b, 10, 15, "LOC");

        let result = differ().diff(&[&a, &b]);
        let set = result
            .configuration_set(&Position::span("NamedEntity", 10, 15))
            .unwrap();

        assert_eq!(set.configurations.len(), 2);
        assert!(set.has_differences());
        assert_eq!(set.state(), PositionState::Disagreed);
    }

    #[test]
    fn test_missing_annotator_is_incomplete() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");
        let b = AnnotationSet::new("b", "doc", schema());

        let result = differ().diff(&[&a, &b]);
        let pos = Position::span("NamedEntity", 10, 15);

        assert_eq!(result.state_of(&pos), Some(PositionState::Incomplete));
        assert_eq!(result.incomplete().count(), 1);
        assert_eq!(result.differing().count(), 0);
    }

    #[test]
    fn test_uneven_stacking_is_flagged() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");
        entity(&mut a, 10, 15, "ORG");
        let mut b = AnnotationSet::new("b", "doc", schema());
        entity(&mut b, 10, 15, "ORG");

        let result = differ().diff(&[&a, &b]);
        let set = result
            .configuration_set(&Position::span("NamedEntity", 10, 15))
            .unwrap();

        assert_eq!(set.configurations.len(), 1);
        assert!(set.stacked);
        assert_eq!(set.state(), PositionState::Stacked);
    }

    #[test]
    fn test_even_identical_stacking_agrees() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");
        entity(&mut a, 10, 15, "ORG");
        let mut b = AnnotationSet::new("b", "doc", schema());
        entity(&mut b, 10, 15, "ORG");
        entity(&mut b, 10, 15, "ORG");

        let result = differ().diff(&[&a, &b]);
        let set = result
            .configuration_set(&Position::span("NamedEntity", 10, 15))
            .unwrap();

        assert!(!set.stacked);
        assert_eq!(set.configurations[0].representatives().len(), 2);
        assert_eq!(set.state(), PositionState::Agreed);
    }

    #[test]
    fn test_schema_mismatch_excludes_layer_positions() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");
        let stale = Schema::new().with_layer(AnnotationLayer::span("NamedEntity"));
        let mut b = AnnotationSet::new("b", "doc", stale);
        b.add_span("NamedEntity", 10, 15).unwrap();

        let result = differ().diff(&[&a, &b]);

        assert!(result.is_empty());
        assert_eq!(result.issues().len(), 1);
        let issue = &result.issues()[0];
        assert_eq!(issue.kind, IssueKind::SchemaMismatch);
        assert_eq!(issue.excluded, vec![Position::span("NamedEntity", 10, 15)]);
        assert_eq!(issue.annotators, vec![AnnotatorId::from("a"), AnnotatorId::from("b")]);
        assert_eq!(result.summary().excluded, 1);
    }

    #[test]
    fn test_chain_and_unknown_layers_are_reported() {
        let a = AnnotationSet::new("a", "doc", schema());
        let differ = CasDiff::new(DiffConfig::new().with_layers(["CoreferenceLink", "Lemma"]));

        let result = differ.diff(&[&a]);

        let kinds: Vec<_> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::UnsupportedLayer, IssueKind::UnknownLayer]);
        assert!(!result.covers_layer("CoreferenceLink"));
    }

    #[test]
    fn test_result_serializes_to_json() {
        let mut a = AnnotationSet::new("a", "doc", schema());
        entity(&mut a, 10, 15, "ORG");

        let result = differ().diff(&[&a]);
        let json = serde_json::to_string(&result).unwrap();
        let back: DiffResult = serde_json::from_str(&json).unwrap();

        assert_eq!(back, result);
    }
}
