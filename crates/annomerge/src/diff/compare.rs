//! Feature-level agreement between two records.
//!
//! Scalar features are compared by value (null equals only null). Slot links
//! are compared by role and by the position of their filler, and the
//! fillers themselves must agree on their base features. Fillers' own slot
//! links are not followed: recursion stops at [`MAX_LINK_DEPTH`].

use crate::model::{AnnotationLayer, AnnotationRecord, FeatureKind, Position, SourceRecord};

/// How many slot-link hops the agreement check follows.
pub const MAX_LINK_DEPTH: usize = 1;

/// Check if two records (possibly from different sets) agree.
pub fn records_agree(a: SourceRecord<'_>, b: SourceRecord<'_>) -> bool {
    agree_at_depth(a, b, 0)
}

/// Check if two records agree on their scalar features only.
///
/// Relation endpoints, references and slot links are ignored.
pub fn same_value_features(layer: &AnnotationLayer, a: &AnnotationRecord, b: &AnnotationRecord) -> bool {
    layer
        .value_features()
        .filter(|f| matches!(f.kind, FeatureKind::Primitive | FeatureKind::StringArray))
        .all(|f| a.feature(&f.name) == b.feature(&f.name))
}

fn agree_at_depth(a: SourceRecord<'_>, b: SourceRecord<'_>, depth: usize) -> bool {
    if a.record.layer != b.record.layer {
        return false;
    }
    let Some(layer) = a.set.schema().layer(&a.record.layer) else {
        return false;
    };

    for feature in layer.value_features() {
        let agrees = match &feature.kind {
            FeatureKind::Primitive | FeatureKind::StringArray => {
                a.record.feature(&feature.name) == b.record.feature(&feature.name)
            }
            FeatureKind::Reference => referenced_position(a, &feature.name)
                == referenced_position(b, &feature.name),
            FeatureKind::SlotLink { .. } if depth >= MAX_LINK_DEPTH => true,
            FeatureKind::SlotLink { .. } => links_agree(a, b, &feature.name, depth),
        };
        if !agrees {
            return false;
        }
    }

    true
}

/// One-to-one matching of two link arrays.
///
/// Every link in `a` needs an unused counterpart in `b` with the same role,
/// a filler at the same position, and a filler that agrees one level down.
fn links_agree(a: SourceRecord<'_>, b: SourceRecord<'_>, feature: &str, depth: usize) -> bool {
    let links_a = a.record.links(feature);
    let links_b = b.record.links(feature);
    if links_a.len() != links_b.len() {
        return false;
    }

    let mut used = vec![false; links_b.len()];
    for link in links_a {
        let Some(filler_a) = a.resolve(link.target) else {
            return false;
        };
        let filler_a = SourceRecord { set: a.set, record: filler_a };
        let position_a = filler_a.position();

        let matched = links_b.iter().enumerate().position(|(i, other)| {
            if used[i] || other.role != link.role {
                return false;
            }
            let Some(filler_b) = b.resolve(other.target) else {
                return false;
            };
            let filler_b = SourceRecord { set: b.set, record: filler_b };
            position_a.is_some()
                && filler_b.position() == position_a
                && agree_at_depth(filler_a, filler_b, depth + 1)
        });

        match matched {
            Some(i) => used[i] = true,
            None => return false,
        }
    }

    true
}

fn referenced_position(source: SourceRecord<'_>, feature: &str) -> Option<Position> {
    let id = source.record.feature(feature).as_ref_id()?;
    let target = source.resolve(id)?;
    source.set.position_of(target)
}
