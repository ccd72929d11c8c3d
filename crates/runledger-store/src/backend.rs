//! Storage contracts for the execution ledger.
//!
//! One trait per ledger component, all implemented by
//! [`SqliteJobStore`](crate::SqliteJobStore): queueing, job/attempt
//! lifecycle, stats aggregation, history retention, and deployment
//! metadata. Model types live in [`runledger_types`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use runledger_types::{
    Attempt, AttemptFailureSummary, AttemptStats, ConfigType, Job, JobAttemptPair, JobStatus,
    JobStatusSummary, NormalizationSummary, Scope, StreamSyncStats, SyncStats,
};

use crate::error;

/// Job column the paginated listing can sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderByField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl OrderByField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction for the paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter for [`JobQueue::list_jobs`].
#[derive(Debug, Clone)]
pub struct JobListFilter {
    pub config_types: Vec<ConfigType>,
    pub scope: Option<Scope>,
    pub statuses: Option<Vec<JobStatus>>,
    pub created_at_start: Option<DateTime<Utc>>,
    pub created_at_end: Option<DateTime<Utc>>,
    pub updated_at_start: Option<DateTime<Utc>>,
    pub updated_at_end: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
    pub order_by: OrderByField,
    pub order: SortOrder,
}

impl Default for JobListFilter {
    fn default() -> Self {
        Self {
            config_types: ConfigType::REPLICATION_TYPES.to_vec(),
            scope: None,
            statuses: None,
            created_at_start: None,
            created_at_end: None,
            updated_at_start: None,
            updated_at_end: None,
            limit: 100,
            offset: 0,
            order_by: OrderByField::default(),
            order: SortOrder::default(),
        }
    }
}

/// Supported wire-protocol version bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersionRange {
    pub min: String,
    pub max: String,
}

/// Enqueueing and job lookup.
pub trait JobQueue: Send + Sync {
    /// Insert a new `Pending` job for `scope`, returning its id.
    ///
    /// For replication config types the insert is conditional: if the scope
    /// already has a replication job in a non-terminal status, nothing is
    /// inserted and `Ok(None)` is returned. Callers must treat `None` as
    /// "already queued", not as an error. Non-replication types are never
    /// deduplicated. The condition and insert are one atomic statement, so
    /// two concurrent enqueue calls for the same scope cannot both win.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn enqueue(
        &self,
        scope: &Scope,
        config_type: ConfigType,
        config: &serde_json::Value,
    ) -> error::Result<Option<i64>>;

    /// Fetch a job with its attempts hydrated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JobNotFound`](crate::StoreError::JobNotFound)
    /// if no such job exists, or a storage error.
    fn get_job(&self, job_id: i64) -> error::Result<Job>;

    /// Paginated, filtered job listing with attempts hydrated.
    ///
    /// Attempts are loaded in one additional query across the whole page,
    /// not one query per job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_jobs(&self, filter: &JobListFilter) -> error::Result<Vec<Job>>;

    /// Jobs in any of `statuses` across all scopes, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_jobs_with_statuses(&self, statuses: &[JobStatus]) -> error::Result<Vec<Job>>;

    /// Most recent replication job per scope, summarized, in one query.
    ///
    /// Scopes with no job history are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn last_job_per_scope(&self, scopes: &[Scope]) -> error::Result<Vec<JobStatusSummary>>;

    /// Oldest `Pending` job whose scope has no `Running` or `Incomplete`
    /// job.
    ///
    /// An `Incomplete` job blocks re-dispatch of its scope until it is
    /// explicitly resolved, so a connection that failed is not silently
    /// double-run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn next_pending_job(&self) -> error::Result<Option<Job>>;
}

/// Job and attempt state transitions. The sole writer of status columns.
pub trait JobLifecycle: Send + Sync {
    /// Force a job back to `Pending`, terminal or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JobNotFound`](crate::StoreError::JobNotFound)
    /// if no such job exists, or a storage error.
    fn reset_job(&self, job_id: i64) -> error::Result<()>;

    /// Move a job to `Cancelled`. A no-op if the job is already terminal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure or an
    /// illegal transition.
    fn cancel_job(&self, job_id: i64) -> error::Result<()>;

    /// Move a job to `Failed`. A no-op if the job is already terminal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure or an
    /// illegal transition.
    fn fail_job(&self, job_id: i64) -> error::Result<()>;

    /// Open a new attempt for a job, returning its 0-based number.
    ///
    /// Moves the job to `Running` (idempotently) and inserts the attempt
    /// with number equal to the current attempt count, so numbers are
    /// dense.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IllegalState`](crate::StoreError::IllegalState)
    /// if the job is terminal or already has a running attempt.
    fn create_attempt(&self, job_id: i64, log_path: &str) -> error::Result<u32>;

    /// Mark an attempt `Succeeded` and drive the parent job to
    /// `Succeeded`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn succeed_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<()>;

    /// Mark an attempt `Failed` and drive the parent job to `Incomplete`.
    ///
    /// The job only reaches `Failed` through explicit
    /// [`fail_job`](Self::fail_job), since retries may follow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn fail_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<()>;

    /// Fetch one attempt, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<Option<Attempt>>;

    /// Record the attempt-scoped sync configuration snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn write_attempt_sync_config(
        &self,
        job_id: i64,
        attempt_number: u32,
        sync_config: &serde_json::Value,
    ) -> error::Result<()>;

    /// Record the workflow-engine correlation id and task queue for an
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn set_attempt_workflow_info(
        &self,
        job_id: i64,
        attempt_number: u32,
        workflow_id: &str,
        task_queue: &str,
    ) -> error::Result<()>;

    /// Read back the workflow-engine correlation id for an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_attempt_workflow_id(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<String>>;
}

/// Per-attempt and per-stream throughput counters.
pub trait StatsAggregator: Send + Sync {
    /// Persist an attempt's output payload and, in the same transaction,
    /// upsert its combined and per-stream stats.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist; on any failure the whole write rolls
    /// back.
    fn write_output(
        &self,
        job_id: i64,
        attempt_number: u32,
        output: &serde_json::Value,
        total_stats: Option<&SyncStats>,
        stream_stats: &[StreamSyncStats],
    ) -> error::Result<()>;

    /// Upsert combined and per-stream stats for an attempt.
    ///
    /// Existence is checked explicitly before choosing insert vs. update
    /// (duplicate historical rows are tolerated, so there is no uniqueness
    /// constraint to upsert against), and the check and write share one
    /// transaction. Per-stream existence is resolved with a single query
    /// for all (name, namespace) pairs, not one query per stream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn write_stats(
        &self,
        job_id: i64,
        attempt_number: u32,
        total_stats: &SyncStats,
        stream_stats: &[StreamSyncStats],
    ) -> error::Result<()>;

    /// Store a structured failure summary for an attempt.
    ///
    /// Null characters (literal and escaped) are stripped before
    /// persisting; they are not representable in the text column and would
    /// otherwise fail the write outright.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn write_attempt_failure_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
        summary: &AttemptFailureSummary,
    ) -> error::Result<()>;

    /// Upsert the normalization summary for an attempt (at most one row).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttemptNotFound`](crate::StoreError::AttemptNotFound)
    /// if the attempt does not exist, or a storage error.
    fn write_normalization_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
        summary: &NormalizationSummary,
    ) -> error::Result<()>;

    /// Read back the normalization summary for an attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_normalization_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<NormalizationSummary>>;

    /// Combined plus per-stream stats for one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_attempt_stats(&self, job_id: i64, attempt_number: u32)
        -> error::Result<AttemptStats>;

    /// Batch stats hydration for many jobs in two queries total.
    ///
    /// Stream-stats rows with no corresponding combined-stats entry are a
    /// store consistency anomaly: they are logged and skipped, never
    /// fatal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_attempt_stats_batch(
        &self,
        job_ids: &[i64],
    ) -> error::Result<HashMap<JobAttemptPair, AttemptStats>>;

    /// Combined stats only, for one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_attempt_combined_stats(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<SyncStats>>;
}

/// Scheduled deletion of old terminal jobs and their dependent records.
pub trait RetentionManager: Send + Sync {
    /// Purge history as of `as_of`, returning the number of jobs deleted.
    ///
    /// Only terminal jobs older than the configured age floor are
    /// eligible; each scope always keeps its most recent jobs up to the
    /// recency floor, and scopes at or under the per-scope count threshold
    /// keep everything. Dependent attempts, stats, and normalization
    /// summaries are removed in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure; on
    /// failure nothing is deleted.
    fn purge_job_history(&self, as_of: DateTime<Utc>) -> error::Result<u64>;
}

/// Process-wide deployment metadata, keyed by well-known strings.
pub trait MetadataStore: Send + Sync {
    /// Read a metadata value, or `None` if the key was never set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_metadata(&self, key: &str) -> error::Result<Option<String>>;

    /// Upsert a metadata value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn set_metadata(&self, key: &str, value: &str) -> error::Result<()>;

    /// The recorded platform version, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_version(&self) -> error::Result<Option<String>>;

    /// Record the platform version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn set_version(&self, version: &str) -> error::Result<()>;

    /// Lower bound of the supported wire-protocol range.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_protocol_version_min(&self) -> error::Result<Option<String>>;

    /// Record the lower protocol bound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn set_protocol_version_min(&self, version: &str) -> error::Result<()>;

    /// Upper bound of the supported wire-protocol range.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_protocol_version_max(&self) -> error::Result<Option<String>>;

    /// Record the upper protocol bound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn set_protocol_version_max(&self, version: &str) -> error::Result<()>;

    /// Both protocol bounds, or `None` when neither has been recorded.
    ///
    /// A single missing bound is suspicious but recoverable: it is logged
    /// and filled with the default version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn protocol_version_range(&self) -> error::Result<Option<ProtocolVersionRange>>;

    /// The deployment identity, if one has been established.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_deployment(&self) -> error::Result<Option<String>>;

    /// Establish the deployment identity, write-once.
    ///
    /// If an id already exists the call is a no-op: the conflict is logged
    /// and the pre-existing id is returned, because a deployment identity
    /// must never change once established.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn set_deployment(&self, deployment_id: &str) -> error::Result<String>;
}
