//! Curator-initiated copy and accept operations.
//!
//! These are the only way a position moves out of the disagreed or
//! incomplete state. Each operation is atomic and re-running it on the same
//! source record does not grow the curator set. Errors are meant to be
//! shown to the curator verbatim (see
//! [`CurationError::is_user_actionable`](crate::error::CurationError::is_user_actionable)).

mod ops;
mod suggestion;

pub use ops::{copy_or_upsert_relation, copy_slot_link, copy_span};
pub use suggestion::{
    accept_suggestion, reject_suggestion, InMemoryLearningRecords, LearningAction, LearningRecord,
    LearningRecordSink,
};
