//! Scheduled purge of old job history.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::backend::RetentionManager;
use crate::error::{self, StoreError};
use crate::sqlite::{sql_string_list, to_sqlite, SqliteJobStore};
use runledger_types::JobStatus;

/// Tunables for [`RetentionManager::purge_job_history`].
///
/// A job is purged only when every gate agrees: it is terminal, older
/// than `minimum_age_in_days`, its scope holds more than
/// `excessive_number_of_jobs` jobs, and it is not among the scope's
/// `minimum_recency` most recent jobs.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub minimum_age_in_days: u32,
    pub excessive_number_of_jobs: u32,
    pub minimum_recency: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            minimum_age_in_days: 30,
            excessive_number_of_jobs: 500,
            minimum_recency: 10,
        }
    }
}

impl RetentionManager for SqliteJobStore {
    fn purge_job_history(&self, as_of: DateTime<Utc>) -> error::Result<u64> {
        let policy = self.retention_policy().clone();
        let cutoff = to_sqlite(as_of - Duration::days(i64::from(policy.minimum_age_in_days)));

        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StoreError::context("purge_job_history: begin tx"))?;

        let select_sql = format!(
            "WITH ranked AS (\
                 SELECT id, status, created_at, \
                        ROW_NUMBER() OVER (\
                            PARTITION BY scope ORDER BY created_at DESC, id DESC\
                        ) AS rn, \
                        COUNT(*) OVER (PARTITION BY scope) AS scope_jobs \
                 FROM jobs\
             ) \
             SELECT id FROM ranked \
             WHERE status IN ({terminal}) \
               AND created_at < ?1 \
               AND scope_jobs > ?2 \
               AND rn > ?3",
            terminal = sql_string_list(JobStatus::TERMINAL.iter().map(|s| s.as_str())),
        );
        let doomed: Vec<i64> = {
            let mut stmt = tx
                .prepare(&select_sql)
                .map_err(StoreError::context("purge_job_history: select doomed jobs"))?;
            let ids = stmt
                .query_map(
                    params![cutoff, policy.excessive_number_of_jobs, policy.minimum_recency],
                    |row| row.get(0),
                )?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            ids
        };
        if doomed.is_empty() {
            return Ok(0);
        }

        let ids = doomed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        // Dependents first: stats and summaries hang off attempt rows.
        for table in ["stream_stats", "sync_stats", "normalization_summaries"] {
            tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE attempt_id IN \
                     (SELECT id FROM attempts WHERE job_id IN ({ids}))"
                ),
                [],
            )?;
        }
        tx.execute(&format!("DELETE FROM attempts WHERE job_id IN ({ids})"), [])?;
        tx.execute(&format!("DELETE FROM jobs WHERE id IN ({ids})"), [])?;
        tx.commit()?;

        let purged = doomed.len() as u64;
        tracing::info!(
            purged,
            minimum_age_in_days = policy.minimum_age_in_days,
            "purged job history"
        );
        Ok(purged)
    }
}
