//! The merge engine: reconciles the curator set with a diff.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::MergeConfig;
use crate::diff::{CandidateRecord, ConfigurationSet, DiffResult, LinkTarget, PositionState};
use crate::model::{AnnotationLayer, FeatureValue, Link, Position, RecordId, Schema};

use super::curator::{scalar_features, MergedAnnotationSet};
use super::report::{MergeReport, StaleSchemaWarning};

/// Applies diff results to a curator set.
///
/// The engine holds no state between calls. Callers must ensure a single
/// writer per curator set for the duration of a call.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    /// Create an engine.
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Re-derive the curator set from a fresh diff.
    ///
    /// Curator records at incomplete, disagreeing or stacked positions are
    /// deleted. At agreeing positions the records are kept and their slot
    /// links pruned to those all annotators agree on. Positions whose layer
    /// the curator schema does not match are skipped with a warning, and
    /// positions the diff excluded for a schema mismatch between annotators
    /// keep their curator records untouched.
    ///
    /// Agreeing positions without a curator record are left alone; see
    /// [`build`](Self::build) for creating them.
    pub fn remerge(&self, diff: &DiffResult, curator: &mut MergedAnnotationSet) -> MergeReport {
        let mut report = MergeReport::new();
        let stale = stale_layers(diff, curator.schema());
        let excluded = excluded_positions(diff);

        for set in diff.positions() {
            let position = &set.position;
            if stale.contains(position.layer()) {
                skip_stale(position, &mut report);
                continue;
            }

            let ids = curator.set().ids_at(position);
            if ids.is_empty() {
                continue;
            }

            if set.is_agreeing() {
                prune_links(diff, set, curator, &ids, &mut report);
            } else {
                for id in ids {
                    report.deleted += curator.inner_mut().remove_cascading(id).len();
                }
            }
        }

        for issue in diff.issues().iter().filter(|issue| !issue.excluded.is_empty()) {
            warn!(
                layer = %issue.layer,
                excluded = issue.excluded.len(),
                "Leaving curator records at schema-mismatched positions untouched"
            );
        }

        if self.config.prune_unmatched {
            prune_unmatched(diff, &stale, &excluded, curator, &mut report);
        }

        if !report.is_unchanged() {
            curator.touch();
        }

        debug!(
            document = %curator.document(),
            deleted = report.deleted,
            updated = report.updated,
            links_dropped = report.links_dropped,
            skipped = report.skipped,
            "Remerge complete"
        );

        report
    }

    /// Build the diffed scope of the curator set from scratch.
    ///
    /// Curator records in the diffed layers and window are cleared, except at
    /// positions the diff excluded for a schema mismatch. Then the
    /// representatives of every agreeing position are copied: spans first,
    /// then relations (whose endpoints must resolve to exactly one curator
    /// record each), then slot links whose fillers agree and resolve.
    pub fn build(&self, diff: &DiffResult, curator: &mut MergedAnnotationSet) -> MergeReport {
        let mut report = MergeReport::new();
        let stale = stale_layers(diff, curator.schema());
        let excluded = excluded_positions(diff);
        let window = diff.window();

        let scope: Vec<RecordId> = curator
            .set()
            .records()
            .filter(|r| diff.covers_layer(&r.layer) && !stale.contains(&r.layer))
            .filter(|r| window.contains(r.begin, r.end))
            .filter(|r| !is_excluded(curator.set().position_of(r), &excluded))
            .map(|r| r.id)
            .collect();
        for id in scope {
            report.deleted += curator.inner_mut().remove_cascading(id).len();
        }

        let mut created: Vec<(RecordId, &CandidateRecord)> = Vec::new();

        for relations in [false, true] {
            for set in diff.agreeing().filter(|s| s.position.is_relation() == relations) {
                let position = &set.position;
                if stale.contains(position.layer()) {
                    skip_stale(position, &mut report);
                    continue;
                }
                let (Some(layer), Some(configuration)) =
                    (diff.layer(position.layer()), set.agreed_configuration())
                else {
                    continue;
                };

                for candidate in configuration.representatives() {
                    match create_record(curator, layer, candidate) {
                        Some(id) => {
                            report.created += 1;
                            created.push((id, candidate));
                        }
                        None => {
                            debug!(%position, "Skipping relation without unique curator endpoints");
                            report.skipped += 1;
                        }
                    }
                }
            }
        }

        for (id, candidate) in created {
            let Some(layer) = diff.layer(&candidate.record.layer) else {
                continue;
            };
            for feature in layer.slot_features() {
                let mut links = Vec::new();
                for target in candidate.links(&feature.name) {
                    match resolve_filler(diff, curator, target) {
                        Some(filler) => links.push(Link::new(target.role.clone(), filler)),
                        None => report.links_dropped += 1,
                    }
                }
                if links.is_empty() {
                    continue;
                }
                if let Some(record) = curator.inner_mut().record_mut(id) {
                    record
                        .features
                        .insert(feature.name.clone(), FeatureValue::Links(links));
                }
            }
        }

        if !report.is_unchanged() {
            curator.touch();
        }

        debug!(
            document = %curator.document(),
            created = report.created,
            deleted = report.deleted,
            links_dropped = report.links_dropped,
            skipped = report.skipped,
            "Curator set built"
        );

        report
    }
}

/// Diffed layers whose definition the curator schema lacks or contradicts.
fn stale_layers(diff: &DiffResult, schema: &Schema) -> HashSet<String> {
    diff.layers()
        .filter(|layer| {
            !schema
                .layer(&layer.name)
                .is_some_and(|own| own.is_compatible_with(layer))
        })
        .map(|layer| layer.name.clone())
        .collect()
}

/// Positions dropped from the diff because annotators' schemas disagree.
fn excluded_positions(diff: &DiffResult) -> HashSet<&Position> {
    diff.issues().iter().flat_map(|issue| &issue.excluded).collect()
}

fn is_excluded(position: Option<Position>, excluded: &HashSet<&Position>) -> bool {
    position.is_some_and(|position| excluded.contains(&position))
}

fn skip_stale(position: &Position, report: &mut MergeReport) {
    warn!(%position, "Skipping position, curator schema is stale");
    report.skipped += 1;
    report.warnings.push(StaleSchemaWarning {
        position: position.clone(),
        layer: position.layer().to_string(),
        message: format!(
            "Curator schema for layer '{}' does not match the annotators' schema",
            position.layer()
        ),
    });
}

/// Whether a link filler at `position` may be asserted by the curator.
///
/// Fillers on diffed layers must agree; fillers on other layers are taken
/// as they are.
fn filler_settled(diff: &DiffResult, position: &Position) -> bool {
    match diff.state_of(position) {
        Some(state) => state == PositionState::Agreed,
        None => !diff.covers_layer(position.layer()),
    }
}

fn resolve_filler(diff: &DiffResult, curator: &MergedAnnotationSet, target: &LinkTarget) -> Option<RecordId> {
    let position = target.position.as_ref()?;
    if !filler_settled(diff, position) {
        return None;
    }
    unique(curator.set().ids_at(position))
}

fn unique(ids: Vec<RecordId>) -> Option<RecordId> {
    match ids.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn create_record(
    curator: &mut MergedAnnotationSet,
    layer: &AnnotationLayer,
    candidate: &CandidateRecord,
) -> Option<RecordId> {
    let record = &candidate.record;
    let scalars = scalar_features(layer, record);

    let features = match (layer.endpoint_features(), &candidate.endpoints) {
        (None, _) => scalars,
        (Some((source_feature, target_feature)), Some((source, target))) => {
            let source_id = unique(curator.set().ids_at(source))?;
            let target_id = unique(curator.set().ids_at(target))?;
            let mut features = IndexMap::new();
            features.insert(source_feature.to_string(), FeatureValue::Ref(source_id));
            features.insert(target_feature.to_string(), FeatureValue::Ref(target_id));
            features.extend(scalars);
            features
        }
        (Some(_), None) => return None,
    };

    Some(
        curator
            .inner_mut()
            .insert(&layer.name, record.begin, record.end, features),
    )
}

/// Drop curator slot links that all annotators do not agree on.
fn prune_links(
    diff: &DiffResult,
    set: &ConfigurationSet,
    curator: &mut MergedAnnotationSet,
    ids: &[RecordId],
    report: &mut MergeReport,
) {
    let (Some(layer), Some(configuration)) = (diff.layer(set.position.layer()), set.agreed_configuration())
    else {
        return;
    };

    for &id in ids {
        let mut changed = false;
        for feature in layer.slot_features() {
            let expected: Vec<&LinkTarget> = configuration
                .representatives()
                .iter()
                .flat_map(|c| c.links(&feature.name))
                .collect();

            let Some(record) = curator.set().record(id) else {
                continue;
            };
            let links = record.links(&feature.name);
            let kept: Vec<Link> = links
                .iter()
                .filter(|link| {
                    let Some(position) = curator
                        .set()
                        .record(link.target)
                        .and_then(|filler| curator.set().position_of(filler))
                    else {
                        return false;
                    };
                    filler_settled(diff, &position)
                        && expected
                            .iter()
                            .any(|t| t.role == link.role && t.position.as_ref() == Some(&position))
                })
                .cloned()
                .collect();

            let dropped = links.len() - kept.len();
            if dropped == 0 {
                continue;
            }
            report.links_dropped += dropped;
            changed = true;
            if let Some(record) = curator.inner_mut().record_mut(id) {
                record
                    .features
                    .insert(feature.name.clone(), FeatureValue::Links(kept));
            }
        }
        if changed {
            report.updated += 1;
        }
    }
}

/// Delete curator records in the diffed scope that no annotator contributed.
fn prune_unmatched(
    diff: &DiffResult,
    stale: &HashSet<String>,
    excluded: &HashSet<&Position>,
    curator: &mut MergedAnnotationSet,
    report: &mut MergeReport,
) {
    let window = diff.window();
    let orphans: Vec<RecordId> = curator
        .set()
        .records()
        .filter(|r| diff.covers_layer(&r.layer) && !stale.contains(&r.layer))
        .filter(|r| window.contains(r.begin, r.end))
        .filter(|r| match curator.set().position_of(r) {
            Some(position) => diff.configuration_set(&position).is_none() && !excluded.contains(&position),
            None => true,
        })
        .map(|r| r.id)
        .collect();

    for id in orphans {
        report.deleted += curator.inner_mut().remove_cascading(id).len();
    }
}
