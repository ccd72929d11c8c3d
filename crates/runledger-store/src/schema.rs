//! Ledger schema: DDL and reserved metadata keys.

/// Reserved metadata key holding the platform version string.
pub const PLATFORM_VERSION_KEY: &str = "platform_version";

/// Reserved metadata key holding the write-once deployment identity.
pub const DEPLOYMENT_ID_KEY: &str = "deployment_id";

/// Reserved metadata keys bounding the supported wire-protocol range.
pub const PROTOCOL_VERSION_MIN_KEY: &str = "protocol_version_min";
pub const PROTOCOL_VERSION_MAX_KEY: &str = "protocol_version_max";

/// Protocol version assumed when only one bound has been recorded.
pub const DEFAULT_PROTOCOL_VERSION: &str = "0.1.0";

/// Idempotent DDL for the ledger tables.
///
/// `sync_stats.attempt_id` is deliberately not unique: historical
/// duplicate rows are an accepted state, which is why writes use an
/// explicit existence check instead of a native upsert.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    config_type TEXT NOT NULL,
    scope TEXT NOT NULL,
    config TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_scope_created ON jobs (scope, created_at);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);

CREATE TABLE IF NOT EXISTS attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    attempt_number INTEGER NOT NULL,
    log_path TEXT NOT NULL,
    sync_config TEXT,
    output TEXT,
    status TEXT NOT NULL,
    processing_task_queue TEXT,
    workflow_id TEXT,
    failure_summary TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    ended_at TEXT,
    UNIQUE (job_id, attempt_number)
);

CREATE TABLE IF NOT EXISTS sync_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id INTEGER NOT NULL,
    records_emitted INTEGER,
    bytes_emitted INTEGER,
    records_committed INTEGER,
    bytes_committed INTEGER,
    estimated_records INTEGER,
    estimated_bytes INTEGER,
    source_state_messages_emitted INTEGER,
    destination_state_messages_emitted INTEGER,
    max_seconds_before_source_state_message_emitted INTEGER,
    mean_seconds_before_source_state_message_emitted INTEGER,
    max_seconds_between_state_message_emitted_and_committed INTEGER,
    mean_seconds_between_state_message_emitted_and_committed INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_stats_attempt ON sync_stats (attempt_id);

CREATE TABLE IF NOT EXISTS stream_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id INTEGER NOT NULL,
    stream_name TEXT NOT NULL,
    stream_namespace TEXT,
    records_emitted INTEGER,
    bytes_emitted INTEGER,
    records_committed INTEGER,
    bytes_committed INTEGER,
    estimated_records INTEGER,
    estimated_bytes INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stream_stats_attempt ON stream_stats (attempt_id);

CREATE TABLE IF NOT EXISTS normalization_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id INTEGER NOT NULL,
    start_time TEXT,
    end_time TEXT,
    failures TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_normalization_summaries_attempt
    ON normalization_summaries (attempt_id);

CREATE TABLE IF NOT EXISTS platform_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
