//! Copy operations from an annotator (or suggestion) set into the curator set.
//!
//! Every operation either completes or leaves the curator set unchanged and
//! returns a user-actionable error.

use indexmap::IndexMap;
use tracing::debug;

use crate::diff::same_value_features;
use crate::error::{CurationError, EndpointSide, Result};
use crate::interfaces::AnnotationSchemaLookup;
use crate::merge::{scalar_features, MergeOutcome, MergedAnnotationSet};
use crate::model::{
    AnnotationLayer, AnnotationRecord, Feature, FeatureKind, FeatureValue, LayerKind, Link, Position,
    RecordId, SourceRecord,
};

/// Copy a span annotation into the curator set.
///
/// Fails with [`CurationError::DuplicateAnnotation`] if a curator record at
/// the same position already has the same feature values. This check runs
/// even when `allow_stacking` is true, so an identical record is never
/// stacked and repeating a copy is idempotent. Otherwise, with stacking
/// disallowed, an existing record is overwritten feature by feature
/// (further stacked records are removed); with stacking allowed a new
/// record is added next to it.
pub fn copy_span(
    curator: &mut MergedAnnotationSet,
    source: SourceRecord<'_>,
    allow_stacking: bool,
) -> Result<MergeOutcome> {
    let layer = curator_layer(curator, source)?;
    if layer.kind != LayerKind::Span {
        return Err(CurationError::UnsupportedLayer {
            layer: layer.name.clone(),
            kind: layer.kind.label().to_string(),
        });
    }

    let record = source.record;
    let position = Position::span(&record.layer, record.begin, record.end);
    upsert(curator, &layer, &position, record, IndexMap::new(), allow_stacking)
}

/// Copy a relation into the curator set, or update the one already there.
///
/// Both endpoints must exist in the curator set exactly once, looked up by
/// position. Stacked endpoints are never picked from: the curator has to
/// resolve the stacking first.
pub fn copy_or_upsert_relation(
    curator: &mut MergedAnnotationSet,
    source: SourceRecord<'_>,
    allow_stacking: bool,
) -> Result<MergeOutcome> {
    let layer = curator_layer(curator, source)?;
    let Some((source_feature, target_feature)) = layer.endpoint_features() else {
        return Err(CurationError::UnsupportedLayer {
            layer: layer.name.clone(),
            kind: layer.kind.label().to_string(),
        });
    };

    let source_endpoint = endpoint_position(source, source_feature)?;
    let target_endpoint = endpoint_position(source, target_feature)?;
    let source_id = curator_endpoint(curator, &source_endpoint, EndpointSide::Source)?;
    let target_id = curator_endpoint(curator, &target_endpoint, EndpointSide::Target)?;

    let mut references = IndexMap::new();
    references.insert(source_feature.to_string(), FeatureValue::Ref(source_id));
    references.insert(target_feature.to_string(), FeatureValue::Ref(target_id));

    let position = Position::relation(&layer.name, source_endpoint.offsets(), target_endpoint.offsets());
    upsert(curator, &layer, &position, source.record, references, allow_stacking)
}

/// Copy one slot link of `source_base` onto the curator record `target_base`.
///
/// `target_base` must be a curator record at the same position as
/// `source_base`. The link's filler is looked up in the curator set by
/// position. A curator link with a filler at the same position is replaced
/// ([`MergeState::Updated`](crate::merge::MergeState)); otherwise the link
/// is appended.
pub fn copy_slot_link(
    curator: &mut MergedAnnotationSet,
    source_base: SourceRecord<'_>,
    feature: &str,
    link_index: usize,
    target_base: RecordId,
) -> Result<MergeOutcome> {
    let layer = curator_layer(curator, source_base)?;
    if !layer.feature(feature).is_some_and(Feature::is_slot) {
        return Err(CurationError::NotASlotFeature {
            layer: layer.name.clone(),
            feature: feature.to_string(),
        });
    }

    let source_links = source_base.record.links(feature);
    let link = source_links
        .get(link_index)
        .ok_or_else(|| CurationError::LinkIndexOutOfRange {
            feature: feature.to_string(),
            index: link_index,
            len: source_links.len(),
        })?;

    let base_position = source_base
        .position()
        .ok_or_else(|| unresolved(source_base, source_base.record.id))?;
    let base_matches = curator
        .set()
        .record(target_base)
        .and_then(|r| curator.set().position_of(r))
        .is_some_and(|p| p == base_position);
    if !base_matches {
        return Err(CurationError::MissingBaseAnnotation {
            position: base_position,
        });
    }

    let filler_position = source_base
        .resolve(link.target)
        .and_then(|filler| source_base.set.position_of(filler))
        .ok_or_else(|| unresolved(source_base, link.target))?;
    let filler = curator_endpoint(curator, &filler_position, EndpointSide::Target)?;
    let copied = Link::new(link.role.clone(), filler);

    let set = curator.set();
    let mut links = set.require(target_base)?.links(feature).to_vec();
    let same_filler = links.iter().position(|existing| {
        set.record(existing.target)
            .and_then(|r| set.position_of(r))
            .is_some_and(|p| p == filler_position)
    });

    let outcome = match same_filler {
        Some(index) => {
            links[index] = copied;
            MergeOutcome::updated(target_base)
        }
        None => {
            links.push(copied);
            MergeOutcome::created(target_base)
        }
    };

    curator.inner_mut().set_feature(target_base, feature, links)?;
    curator.touch();

    debug!(
        base = %base_position,
        filler = %filler_position,
        feature,
        state = ?outcome.state,
        "Copied slot link"
    );

    Ok(outcome)
}

/// The curator's definition of the source record's layer.
///
/// Both sides must agree on the definition.
fn curator_layer(curator: &MergedAnnotationSet, source: SourceRecord<'_>) -> Result<AnnotationLayer> {
    let own = curator.schema().layer_by_name(&source.record.layer)?;
    let theirs = source.layer()?;
    if !own.is_compatible_with(theirs) {
        return Err(CurationError::SchemaMismatch {
            layer: own.name.clone(),
            annotators: vec![source.set.annotator.clone(), curator.curator().clone()],
        });
    }
    Ok(own.clone())
}

fn unresolved(source: SourceRecord<'_>, record: RecordId) -> CurationError {
    CurationError::UnknownRecord {
        annotator: source.set.annotator.clone(),
        record,
    }
}

/// Position of a relation endpoint in the source set.
fn endpoint_position(source: SourceRecord<'_>, feature: &str) -> Result<Position> {
    let id = source
        .record
        .feature(feature)
        .as_ref_id()
        .ok_or_else(|| unresolved(source, source.record.id))?;
    source
        .resolve(id)
        .and_then(|endpoint| source.set.position_of(endpoint))
        .ok_or_else(|| unresolved(source, id))
}

/// The single curator record at an endpoint position.
fn curator_endpoint(curator: &MergedAnnotationSet, position: &Position, side: EndpointSide) -> Result<RecordId> {
    match curator.set().ids_at(position).as_slice() {
        [] => Err(CurationError::MissingEndpoint {
            position: position.clone(),
            side,
        }),
        [only] => Ok(*only),
        stacked => Err(CurationError::AmbiguousEndpoint {
            position: position.clone(),
            side,
            candidates: stacked.len(),
        }),
    }
}

fn upsert(
    curator: &mut MergedAnnotationSet,
    layer: &AnnotationLayer,
    position: &Position,
    source: &AnnotationRecord,
    references: IndexMap<String, FeatureValue>,
    allow_stacking: bool,
) -> Result<MergeOutcome> {
    let existing = curator.set().ids_at(position);
    let duplicate = existing
        .iter()
        .filter_map(|&id| curator.set().record(id))
        .any(|r| same_value_features(layer, r, source));
    if duplicate {
        return Err(CurationError::DuplicateAnnotation {
            position: position.clone(),
        });
    }

    let scalars = scalar_features(layer, source);
    let features = curator.schema().features_of(layer);
    let outcome = match existing.split_first() {
        Some((&first, stacked)) if !allow_stacking => {
            for &extra in stacked {
                curator.inner_mut().remove_cascading(extra);
            }
            if let Some(record) = curator.inner_mut().record_mut(first) {
                overwrite(features, record, scalars, references);
            }
            MergeOutcome::updated(first)
        }
        _ => {
            let mut features = references;
            features.extend(scalars);
            let id = curator
                .inner_mut()
                .insert(&layer.name, source.begin, source.end, features);
            MergeOutcome::created(id)
        }
    };

    curator.touch();
    debug!(%position, state = ?outcome.state, record = %outcome.record, "Copied annotation");

    Ok(outcome)
}

/// Replace the scalar features and references of a curator record.
///
/// Slot links are kept.
fn overwrite(
    features: &[Feature],
    record: &mut AnnotationRecord,
    scalars: IndexMap<String, FeatureValue>,
    references: IndexMap<String, FeatureValue>,
) {
    for feature in features {
        if matches!(feature.kind, FeatureKind::Primitive | FeatureKind::StringArray)
            && !scalars.contains_key(&feature.name)
        {
            record.features.shift_remove(&feature.name);
        }
    }
    record.features.extend(references);
    record.features.extend(scalars);
}
