//! Throughput stats and normalization summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::FailureReason;

/// Aggregate counters for one attempt.
///
/// All fields are optional: workers report whichever counters they have,
/// and partially-reported rows are a normal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub records_emitted: Option<i64>,
    pub bytes_emitted: Option<i64>,
    pub records_committed: Option<i64>,
    pub bytes_committed: Option<i64>,
    pub estimated_records: Option<i64>,
    pub estimated_bytes: Option<i64>,
    pub source_state_messages_emitted: Option<i64>,
    pub destination_state_messages_emitted: Option<i64>,
    pub max_seconds_before_source_state_message_emitted: Option<i64>,
    pub mean_seconds_before_source_state_message_emitted: Option<i64>,
    pub max_seconds_between_state_message_emitted_and_committed: Option<i64>,
    pub mean_seconds_between_state_message_emitted_and_committed: Option<i64>,
}

/// Identifies a stream within an attempt's per-stream stats.
///
/// A `None` namespace is a distinct, matchable key value, not a wildcard:
/// two rows that differ only in namespace presence are different streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }
}

/// Per-stream counters mirroring [`SyncStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSyncStats {
    pub descriptor: StreamDescriptor,
    pub stats: SyncStats,
}

/// Combined and per-stream stats for one attempt, as hydrated from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub combined: Option<SyncStats>,
    pub per_stream: Vec<StreamSyncStats>,
}

/// Map key for the batched multi-job stats read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobAttemptPair {
    pub job_id: i64,
    pub attempt_number: u32,
}

impl std::fmt::Display for JobAttemptPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(job {}, attempt {})", self.job_id, self.attempt_number)
    }
}

/// Outcome of the normalization phase of an attempt, at most one per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<FailureReason>>,
}
