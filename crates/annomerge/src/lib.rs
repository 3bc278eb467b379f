//! Annomerge: diff and merge engine for multi-annotator annotation curation.
//!
//! Several annotators independently annotate the same document. Annomerge
//! aligns their annotations by text position, decides where they agree, and
//! maintains a single curator-owned set that only ever asserts what all
//! annotators agree on, plus whatever the curator copies in explicitly.
//!
//! # Core Principles
//!
//! - **Position-keyed**: annotations from different sets are aligned by
//!   offsets, never by identity
//! - **Conservative merge**: disagreeing, incomplete and stacked positions
//!   are never merged automatically
//! - **No I/O**: snapshots and persistence come from collaborators
//!
//! # Example
//!
//! ```no_run
//! use annomerge::{Curation, CurationConfig, DiffConfig};
//! use annomerge::interfaces::{InMemoryCuratorStore, InMemoryDocumentProvider};
//! use annomerge::model::{AnnotationLayer, Feature, Schema, TextWindow};
//!
//! let schema = Schema::new()
//!     .with_layer(AnnotationLayer::span("NamedEntity").with_feature(Feature::primitive("value")));
//!
//! let mut curation = Curation::new(schema, InMemoryDocumentProvider::new(), InMemoryCuratorStore::new())
//!     .with_config(CurationConfig::new().with_diff(
//!         DiffConfig::new()
//!             .with_layer("NamedEntity")
//!             .with_window(TextWindow::new(0, 100)),
//!     ));
//!
//! let (mut curator, diff) = curation.open("doc1").unwrap();
//! println!("Differing positions: {}", diff.differing().count());
//!
//! let (_, report) = curation.remerge_and_save(&mut curator).unwrap();
//! println!("Deleted: {}", report.deleted);
//! ```

pub mod acceptance;
pub mod config;
pub mod diff;
pub mod error;
pub mod interfaces;
pub mod merge;
pub mod model;

mod curation;

pub use crate::curation::Curation;
pub use acceptance::{
    accept_suggestion, copy_or_upsert_relation, copy_slot_link, copy_span, reject_suggestion, LearningRecord,
    LearningRecordSink,
};
pub use config::{CurationConfig, DiffConfig, MergeConfig};
pub use diff::{CasDiff, ConfigurationSet, DiffResult, PositionState};
pub use error::{CurationError, Result};
pub use merge::{CuratorState, MergeEngine, MergeOutcome, MergeReport, MergedAnnotationSet};
pub use model::{AnnotationLayer, AnnotationRecord, AnnotationSet, AnnotatorId, Position, Schema, TextWindow};
