//! Submission orchestration.
//!
//! This module owns the lifecycle of one bug-filing attempt: the concurrent
//! collector pool, the sequential protocol drive, and their reconciliation
//! into a single verdict. UI layers consume the event stream and verdict.

mod submission;

pub use submission::{
    LogKind, LogLine, SubmissionControl, SubmissionEvent, SubmissionOrchestrator, Verdict,
};
