//! Job and attempt state transitions.
//!
//! Every status change funnels through [`update_job_status`], which
//! consults the transition table in `runledger-types` so an illegal
//! request fails before anything is written. Requests that the table
//! marks as no-ops (terminal jobs, repeated statuses) are ignored
//! silently so lifecycle calls stay idempotent.

use rusqlite::{params, Connection, OptionalExtension};
use runledger_types::{
    apply_transition, Attempt, AttemptStatus, JobStatus, TransitionOutcome,
};

use crate::backend::JobLifecycle;
use crate::error::{self, StoreError};
use crate::sqlite::{attempt_from_row, fetch_job, SqliteJobStore, ATTEMPT_COLUMNS};

/// Apply a requested status to a job, honoring the transition table.
///
/// Callers pass the timestamp so that a multi-statement transaction
/// stamps every row with the same instant.
pub(crate) fn update_job_status(
    conn: &Connection,
    now: &str,
    job_id: i64,
    requested: JobStatus,
) -> error::Result<()> {
    let raw: String = conn
        .query_row(
            "SELECT status FROM jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::JobNotFound(job_id))?;
    let current: JobStatus = raw.parse()?;

    match apply_transition(current, requested)? {
        TransitionOutcome::Ignored => {
            tracing::debug!(job_id, from = %current, to = %requested, "status change ignored");
            Ok(())
        }
        TransitionOutcome::Advance(next) => {
            // First entry into RUNNING also stamps started_at, once.
            conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2, \
                 started_at = CASE \
                     WHEN ?1 = 'running' AND started_at IS NULL THEN ?2 \
                     ELSE started_at \
                 END \
                 WHERE id = ?3",
                params![next.as_str(), now, job_id],
            )?;
            Ok(())
        }
    }
}

fn terminate_attempt(
    store: &SqliteJobStore,
    job_id: i64,
    attempt_number: u32,
    attempt_status: AttemptStatus,
    job_status: JobStatus,
) -> error::Result<()> {
    let conn = store.lock_conn()?;
    let now = store.now_sqlite();
    let tx = conn.unchecked_transaction()?;
    update_job_status(&tx, &now, job_id, job_status)?;
    let changed = tx.execute(
        "UPDATE attempts SET status = ?1, updated_at = ?2, ended_at = ?2 \
         WHERE job_id = ?3 AND attempt_number = ?4",
        params![attempt_status.as_str(), now, job_id, attempt_number],
    )?;
    if changed == 0 {
        return Err(StoreError::AttemptNotFound {
            job_id,
            attempt_number,
        });
    }
    tx.commit()?;
    tracing::info!(job_id, attempt_number, status = %attempt_status, "attempt finished");
    Ok(())
}

fn update_attempt_row(
    store: &SqliteJobStore,
    job_id: i64,
    attempt_number: u32,
    sql: &str,
    value: &str,
    extra: Option<&str>,
) -> error::Result<()> {
    let conn = store.lock_conn()?;
    let now = store.now_sqlite();
    let changed = match extra {
        Some(extra) => conn.execute(sql, params![value, extra, now, job_id, attempt_number])?,
        None => conn.execute(sql, params![value, now, job_id, attempt_number])?,
    };
    if changed == 0 {
        return Err(StoreError::AttemptNotFound {
            job_id,
            attempt_number,
        });
    }
    Ok(())
}

impl JobLifecycle for SqliteJobStore {
    fn reset_job(&self, job_id: i64) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        // Deliberate bypass of the transition table: reset is the
        // operator's escape hatch and must work from any state,
        // terminal included.
        let changed = conn.execute(
            "UPDATE jobs SET status = 'pending', updated_at = ?1 WHERE id = ?2",
            params![now, job_id],
        )?;
        if changed == 0 {
            return Err(StoreError::JobNotFound(job_id));
        }
        tracing::info!(job_id, "job reset to pending");
        Ok(())
    }

    fn cancel_job(&self, job_id: i64) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;
        update_job_status(&tx, &now, job_id, JobStatus::Cancelled)?;
        tx.commit()?;
        Ok(())
    }

    fn fail_job(&self, job_id: i64) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;
        update_job_status(&tx, &now, job_id, JobStatus::Failed)?;
        tx.commit()?;
        Ok(())
    }

    fn create_attempt(&self, job_id: i64, log_path: &str) -> error::Result<u32> {
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;

        let job = fetch_job(&tx, job_id)?;
        if job.is_terminal() {
            return Err(StoreError::IllegalState(format!(
                "cannot create attempt for job {job_id} in terminal state {}",
                job.status
            )));
        }
        if job.has_running_attempt() {
            return Err(StoreError::IllegalState(format!(
                "job {job_id} already has a running attempt"
            )));
        }

        update_job_status(&tx, &now, job_id, JobStatus::Running)?;
        // Attempt numbers are dense: the next one is the current count.
        let attempt_number = job.attempt_count();
        tx.execute(
            "INSERT INTO attempts \
             (job_id, attempt_number, log_path, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'running', ?4, ?4)",
            params![job_id, attempt_number, log_path, now],
        )?;
        tx.commit()?;
        tracing::info!(job_id, attempt_number, "created attempt");
        Ok(attempt_number)
    }

    fn succeed_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<()> {
        terminate_attempt(
            self,
            job_id,
            attempt_number,
            AttemptStatus::Succeeded,
            JobStatus::Succeeded,
        )
    }

    fn fail_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<()> {
        // The job goes INCOMPLETE, not FAILED: a later attempt or an
        // explicit fail_job decides the job's fate.
        terminate_attempt(
            self,
            job_id,
            attempt_number,
            AttemptStatus::Failed,
            JobStatus::Incomplete,
        )
    }

    fn get_attempt(&self, job_id: i64, attempt_number: u32) -> error::Result<Option<Attempt>> {
        let conn = self.lock_conn()?;
        let attempt = conn
            .query_row(
                &format!(
                    "SELECT {ATTEMPT_COLUMNS} FROM attempts \
                     WHERE job_id = ?1 AND attempt_number = ?2"
                ),
                params![job_id, attempt_number],
                attempt_from_row,
            )
            .optional()?;
        Ok(attempt)
    }

    fn write_attempt_sync_config(
        &self,
        job_id: i64,
        attempt_number: u32,
        sync_config: &serde_json::Value,
    ) -> error::Result<()> {
        let json = serde_json::to_string(sync_config)?;
        update_attempt_row(
            self,
            job_id,
            attempt_number,
            "UPDATE attempts SET sync_config = ?1, updated_at = ?2 \
             WHERE job_id = ?3 AND attempt_number = ?4",
            &json,
            None,
        )
    }

    fn set_attempt_workflow_info(
        &self,
        job_id: i64,
        attempt_number: u32,
        workflow_id: &str,
        task_queue: &str,
    ) -> error::Result<()> {
        update_attempt_row(
            self,
            job_id,
            attempt_number,
            "UPDATE attempts SET workflow_id = ?1, processing_task_queue = ?2, updated_at = ?3 \
             WHERE job_id = ?4 AND attempt_number = ?5",
            workflow_id,
            Some(task_queue),
        )
    }

    fn get_attempt_workflow_id(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<String>> {
        let conn = self.lock_conn()?;
        let workflow_id: Option<Option<String>> = conn
            .query_row(
                "SELECT workflow_id FROM attempts WHERE job_id = ?1 AND attempt_number = ?2",
                params![job_id, attempt_number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(workflow_id.flatten())
    }
}
