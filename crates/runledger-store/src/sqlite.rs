//! `SQLite`-backed job store: connection handling, time formatting, and
//! row mapping shared by the component impls.
//!
//! Uses a single `Mutex<Connection>` for thread safety. The component
//! trait implementations live in sibling modules (`queue`, `lifecycle`,
//! `stats`, `retention`, `metadata`).

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use runledger_types::{Attempt, Job};

use crate::clock::{Clock, SystemClock};
use crate::error::{self, StoreError};
use crate::retention::RetentionPolicy;
use crate::schema;

/// `SQLite` datetime format (UTC, no timezone suffix).
pub(crate) const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Column list every job read uses, in mapper order.
pub(crate) const JOB_COLUMNS: &str =
    "id, config_type, scope, config, status, started_at, created_at, updated_at";

/// Column list every attempt read uses, in mapper order.
pub(crate) const ATTEMPT_COLUMNS: &str = "attempt_number, job_id, log_path, sync_config, output, \
     status, processing_task_queue, workflow_id, failure_summary, created_at, updated_at, ended_at";

/// `SQLite`-backed execution ledger.
///
/// Create with [`SqliteJobStore::open`] for file-backed persistence or
/// [`SqliteJobStore::in_memory`] for tests; inject a clock and retention
/// policy with the `with_*` constructors.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    retention: RetentionPolicy,
}

impl SqliteJobStore {
    /// Open or create a ledger database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created, or
    /// [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        Self::open_with(path, Arc::new(SystemClock), RetentionPolicy::default())
    }

    /// Open a file-backed ledger with an injected clock and retention
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created, or
    /// [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open_with(
        path: &Path,
        clock: Arc<dyn Clock>,
        retention: RetentionPolicy,
    ) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            retention,
        })
    }

    /// Create an in-memory ledger (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        Self::in_memory_with(Arc::new(SystemClock), RetentionPolicy::default())
    }

    /// Create an in-memory ledger with an injected clock and retention
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory_with(
        clock: Arc<dyn Clock>,
        retention: RetentionPolicy,
    ) -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            retention,
        })
    }

    /// Acquire the connection lock.
    pub(crate) fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// The configured retention tunables.
    #[must_use]
    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Current clock time formatted for `SQLite` storage.
    pub(crate) fn now_sqlite(&self) -> String {
        to_sqlite(self.clock.now())
    }
}

/// Format a UTC instant for `SQLite` storage.
pub(crate) fn to_sqlite(dt: DateTime<Utc>) -> String {
    dt.format(SQLITE_DATETIME_FMT).to_string()
}

/// Parse a stored `SQLite` datetime back to UTC.
pub(crate) fn dt_from_sql(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT)
        .map(|naive| naive.and_utc())
        .map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn opt_dt_from_sql(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|value| dt_from_sql(idx, &value)).transpose()
}

/// Parse a stored enum string, surfacing corruption as a conversion error.
pub(crate) fn parse_stored<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn json_from_sql(idx: usize, raw: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| conversion_failure(idx, e))
}

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Render `'a','b','c'` for IN clauses over static enum strings.
pub(crate) fn sql_string_list<I>(values: I) -> String
where
    I: IntoIterator<Item = &'static str>,
{
    values
        .into_iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Map a row selected with [`JOB_COLUMNS`]; attempts are hydrated
/// separately.
pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let config_type: String = row.get(1)?;
    let scope: String = row.get(2)?;
    let config: String = row.get(3)?;
    let status: String = row.get(4)?;
    let started_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Job {
        id: row.get(0)?,
        config_type: parse_stored(1, &config_type)?,
        scope: scope.into(),
        config: json_from_sql(3, &config)?,
        status: parse_stored(4, &status)?,
        attempts: Vec::new(),
        started_at: opt_dt_from_sql(5, started_at)?,
        created_at: dt_from_sql(6, &created_at)?,
        updated_at: dt_from_sql(7, &updated_at)?,
    })
}

/// Map a row selected with [`ATTEMPT_COLUMNS`].
pub(crate) fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<Attempt> {
    let sync_config: Option<String> = row.get(3)?;
    let output: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let failure_summary: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let ended_at: Option<String> = row.get(11)?;
    Ok(Attempt {
        attempt_number: row.get(0)?,
        job_id: row.get(1)?,
        log_path: row.get(2)?,
        sync_config: sync_config
            .map(|raw| json_from_sql(3, &raw))
            .transpose()?,
        output: output.map(|raw| json_from_sql(4, &raw)).transpose()?,
        status: parse_stored(5, &status)?,
        processing_task_queue: row.get(6)?,
        workflow_id: row.get(7)?,
        failure_summary: failure_summary
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| conversion_failure(8, e))
            })
            .transpose()?,
        created_at: dt_from_sql(9, &created_at)?,
        updated_at: dt_from_sql(10, &updated_at)?,
        ended_at: opt_dt_from_sql(11, ended_at)?,
    })
}

/// All attempts for a job, ordered by attempt number.
pub(crate) fn fetch_attempts(conn: &Connection, job_id: i64) -> error::Result<Vec<Attempt>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE job_id = ?1 ORDER BY attempt_number ASC"
    ))?;
    let attempts = stmt
        .query_map([job_id], attempt_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(attempts)
}

/// A job with its attempts hydrated, or [`StoreError::JobNotFound`].
pub(crate) fn fetch_job(conn: &Connection, job_id: i64) -> error::Result<Job> {
    let job = conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [job_id],
            job_from_row,
        )
        .optional()?;
    let mut job = job.ok_or(StoreError::JobNotFound(job_id))?;
    job.attempts = fetch_attempts(conn, job_id)?;
    Ok(job)
}

/// Row id of an attempt, or `None` if it does not exist.
pub(crate) fn attempt_row_id(
    conn: &Connection,
    job_id: i64,
    attempt_number: u32,
) -> error::Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM attempts WHERE job_id = ?1 AND attempt_number = ?2",
            rusqlite::params![job_id, attempt_number],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Row id of an attempt, or [`StoreError::AttemptNotFound`].
pub(crate) fn require_attempt_id(
    conn: &Connection,
    job_id: i64,
    attempt_number: u32,
) -> error::Result<i64> {
    attempt_row_id(conn, job_id, attempt_number)?.ok_or(StoreError::AttemptNotFound {
        job_id,
        attempt_number,
    })
}
