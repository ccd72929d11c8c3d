//! Data model for the Runledger execution ledger.
//!
//! Pure data types shared by the store and its callers: jobs, attempts,
//! throughput stats, and the status enums that drive the job/attempt
//! state machine. Kept free of storage dependencies so schedulers and
//! workers can share them without pulling in the backend.

#![warn(clippy::pedantic)]

pub mod attempt;
pub mod job;
pub mod scope;
pub mod stats;

pub use attempt::{Attempt, AttemptFailureSummary, AttemptStatus, FailureReason};
pub use job::{
    apply_transition, ConfigType, InvalidTransition, Job, JobStatus, JobStatusSummary,
    TransitionOutcome, UnknownEnumValue,
};
pub use scope::Scope;
pub use stats::{
    AttemptStats, JobAttemptPair, NormalizationSummary, StreamDescriptor, StreamSyncStats,
    SyncStats,
};
