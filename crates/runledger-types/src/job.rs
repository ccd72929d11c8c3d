//! Job model and the job status state machine.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::{Attempt, AttemptStatus};
use crate::scope::Scope;

/// A stored enum value that could not be mapped back to its Rust type.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct UnknownEnumValue {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of work a job performs.
///
/// Replication kinds (sync, reset, refresh) are subject to the
/// one-non-terminal-job-per-scope rule; the other kinds are queued through
/// the same table but never deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    Sync,
    ResetConnection,
    Refresh,
    CheckConnection,
    DiscoverSchema,
}

impl ConfigType {
    /// The kinds that replicate data for a connection and therefore must
    /// not run concurrently for the same scope.
    pub const REPLICATION_TYPES: [ConfigType; 3] =
        [Self::Sync, Self::ResetConnection, Self::Refresh];

    /// Whether this kind participates in enqueue deduplication.
    #[must_use]
    pub fn is_replication(self) -> bool {
        Self::REPLICATION_TYPES.contains(&self)
    }

    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::ResetConnection => "reset_connection",
            Self::Refresh => "refresh",
            Self::CheckConnection => "check_connection",
            Self::DiscoverSchema => "discover_schema",
        }
    }
}

impl FromStr for ConfigType {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "reset_connection" => Ok(Self::ResetConnection),
            "refresh" => Ok(Self::Refresh),
            "check_connection" => Ok(Self::CheckConnection),
            "discover_schema" => Ok(Self::DiscoverSchema),
            other => Err(UnknownEnumValue {
                kind: "config_type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Incomplete,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Statuses from which no further transition is permitted.
    ///
    /// `Incomplete` is deliberately absent: an incomplete job is
    /// re-enterable via retry or reset.
    pub const TERMINAL: [JobStatus; 3] = [Self::Succeeded, Self::Failed, Self::Cancelled];

    /// Statuses that count as "still in the queue" for deduplication and
    /// dispatch blocking.
    pub const NON_TERMINAL: [JobStatus; 3] = [Self::Pending, Self::Running, Self::Incomplete];

    #[must_use]
    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Incomplete => "incomplete",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable from `self` through the normal transition rules.
    ///
    /// Reset-to-pending is not listed here; it is a forced transition that
    /// bypasses the table.
    #[must_use]
    fn legal_targets(self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[
                Self::Running,
                Self::Incomplete,
                Self::Failed,
                Self::Cancelled,
            ],
            Self::Running => &[
                Self::Incomplete,
                Self::Succeeded,
                Self::Failed,
                Self::Cancelled,
            ],
            Self::Incomplete => &[
                Self::Pending,
                Self::Running,
                Self::Failed,
                Self::Cancelled,
            ],
            Self::Succeeded | Self::Failed | Self::Cancelled => &[],
        }
    }
}

impl FromStr for JobStatus {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "incomplete" => Ok(Self::Incomplete),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownEnumValue {
                kind: "job_status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition that does not appear in the legal-transition table.
///
/// Signals a caller bug (e.g. completing a job that never started), not a
/// retryable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal job status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Result of consulting the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The job should move to the contained status.
    Advance(JobStatus),
    /// The request is a silent no-op: the job is already terminal, or
    /// already in the requested status.
    Ignored,
}

/// Shared transition rule consulted by every job mutation.
///
/// A terminal current status absorbs every request, which is what makes
/// `cancel`/`fail` idempotent and safe to call from multiple
/// failure-handling paths without coordination.
///
/// # Errors
///
/// Returns [`InvalidTransition`] for transitions outside the legal table,
/// e.g. `Pending -> Succeeded`.
pub fn apply_transition(
    current: JobStatus,
    requested: JobStatus,
) -> Result<TransitionOutcome, InvalidTransition> {
    if current.is_terminal() || current == requested {
        return Ok(TransitionOutcome::Ignored);
    }
    if current.legal_targets().contains(&requested) {
        Ok(TransitionOutcome::Advance(requested))
    } else {
        Err(InvalidTransition {
            from: current,
            to: requested,
        })
    }
}

/// One execution request for a scope, with its attempts hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub config_type: ConfigType,
    pub scope: Scope,
    /// Serialized configuration snapshot, immutable once created.
    pub config: serde_json::Value,
    pub status: JobStatus,
    pub attempts: Vec<Attempt>,
    /// Set on the first transition into `Running`.
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn has_running_attempt(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.status == AttemptStatus::Running)
    }

    /// Number of attempts so far; doubles as the next attempt number.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

/// Summary row for the bulk "latest run per scope" read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSummary {
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}
