//! Configuration diffing across annotators.
//!
//! The differ aligns records from every annotator by [`Position`](crate::model::Position),
//! groups them into configurations of agreeing records, and classifies each
//! position as agreed, disagreed, incomplete or stacked.

mod compare;
mod configuration;
mod differ;
mod index;
mod result;

pub use compare::{records_agree, same_value_features, MAX_LINK_DEPTH};
pub use configuration::{
    fingerprint, CandidateRecord, Configuration, ConfigurationSet, LinkTarget, PositionState,
};
pub use differ::CasDiff;
pub use index::PositionIndex;
pub use result::{DiffIssue, DiffResult, DiffSummary, IssueKind, StateCounts, UnavailableAnnotator};
