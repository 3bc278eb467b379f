//! Merging diff results into the curator set.
//!
//! # Usage
//!
//! ```no_run
//! use annomerge::config::{DiffConfig, MergeConfig};
//! use annomerge::diff::CasDiff;
//! use annomerge::merge::{MergeEngine, MergedAnnotationSet};
//! use annomerge::model::{AnnotationSet, Schema};
//!
//! # fn sets() -> (Schema, Vec<AnnotationSet>) { unimplemented!() }
//! let (schema, annotators) = sets();
//! let refs: Vec<&AnnotationSet> = annotators.iter().collect();
//! let diff = CasDiff::new(DiffConfig::new().with_layer("NamedEntity")).diff(&refs);
//!
//! let engine = MergeEngine::new(MergeConfig::default());
//! let mut curator = MergedAnnotationSet::new("CURATION_USER", "doc1", schema);
//! engine.build(&diff, &mut curator);
//!
//! // Later, after annotators changed their work:
//! let report = engine.remerge(&diff, &mut curator);
//! println!("Deleted: {}", report.deleted);
//! ```

mod curator;
mod engine;
mod report;

pub use curator::{CuratorState, MergedAnnotationSet, CURATION_FORMAT_VERSION};
pub use engine::MergeEngine;
pub use report::{MergeOutcome, MergeReport, MergeState, StaleSchemaWarning};

pub(crate) use curator::scalar_features;
