//! Job queue: enqueue-with-deduplication and job lookups.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use runledger_types::{Attempt, ConfigType, Job, JobStatus, JobStatusSummary, Scope};

use crate::backend::{JobListFilter, JobQueue};
use crate::error;
use crate::sqlite::{
    attempt_from_row, dt_from_sql, fetch_job, job_from_row, parse_stored, sql_string_list,
    to_sqlite, SqliteJobStore, ATTEMPT_COLUMNS, JOB_COLUMNS,
};

/// Fill in attempts for a page of jobs with one query, not one per job.
pub(crate) fn hydrate_attempts(conn: &Connection, jobs: &mut [Job]) -> error::Result<()> {
    if jobs.is_empty() {
        return Ok(());
    }
    let ids = jobs
        .iter()
        .map(|job| job.id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE job_id IN ({ids}) \
         ORDER BY job_id, attempt_number"
    ))?;
    let mut by_job: HashMap<i64, Vec<Attempt>> = HashMap::new();
    for attempt in stmt.query_map([], attempt_from_row)? {
        let attempt = attempt?;
        by_job.entry(attempt.job_id).or_default().push(attempt);
    }
    for job in jobs {
        if let Some(attempts) = by_job.remove(&job.id) {
            job.attempts = attempts;
        }
    }
    Ok(())
}

fn replication_types_sql() -> String {
    sql_string_list(ConfigType::REPLICATION_TYPES.iter().map(|t| t.as_str()))
}

impl JobQueue for SqliteJobStore {
    fn enqueue(
        &self,
        scope: &Scope,
        config_type: ConfigType,
        config: &serde_json::Value,
    ) -> error::Result<Option<i64>> {
        let config_json = serde_json::to_string(config)?;
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        tracing::info!(scope = %scope, config_type = %config_type, "enqueuing pending job");

        let inserted = if config_type.is_replication() {
            // Single atomic conditional insert; a read-then-write here
            // would race with a concurrent enqueue for the same scope.
            let sql = format!(
                "INSERT INTO jobs (config_type, scope, config, status, created_at, updated_at) \
                 SELECT ?1, ?2, ?3, 'pending', ?4, ?4 \
                 WHERE NOT EXISTS (\
                     SELECT 1 FROM jobs \
                     WHERE scope = ?2 AND config_type IN ({}) AND status IN ({}))",
                replication_types_sql(),
                sql_string_list(JobStatus::NON_TERMINAL.iter().map(|s| s.as_str())),
            );
            conn.execute(
                &sql,
                params![config_type.as_str(), scope.as_str(), config_json, now],
            )?
        } else {
            conn.execute(
                "INSERT INTO jobs (config_type, scope, config, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
                params![config_type.as_str(), scope.as_str(), config_json, now],
            )?
        };

        if inserted == 0 {
            tracing::debug!(
                scope = %scope,
                "scope already has a non-terminal replication job, enqueue skipped"
            );
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    fn get_job(&self, job_id: i64) -> error::Result<Job> {
        let conn = self.lock_conn()?;
        fetch_job(&conn, job_id)
    }

    fn list_jobs(&self, filter: &JobListFilter) -> error::Result<Vec<Job>> {
        if filter.config_types.is_empty() {
            return Ok(Vec::new());
        }
        if matches!(&filter.statuses, Some(statuses) if statuses.is_empty()) {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE config_type IN ({})",
            sql_string_list(filter.config_types.iter().map(|t| t.as_str())),
        );
        let mut params: Vec<Value> = Vec::new();

        if let Some(scope) = &filter.scope {
            sql.push_str(" AND scope = ?");
            params.push(Value::from(scope.as_str().to_string()));
        }
        if let Some(statuses) = &filter.statuses {
            sql.push_str(&format!(
                " AND status IN ({})",
                sql_string_list(statuses.iter().map(|s| s.as_str()))
            ));
        }
        let ranges = [
            ("created_at", ">=", filter.created_at_start),
            ("created_at", "<=", filter.created_at_end),
            ("updated_at", ">=", filter.updated_at_start),
            ("updated_at", "<=", filter.updated_at_end),
        ];
        for (column, op, bound) in ranges {
            if let Some(dt) = bound {
                sql.push_str(&format!(" AND {column} {op} ?"));
                params.push(Value::from(to_sqlite(dt)));
            }
        }
        let direction = filter.order.sql();
        sql.push_str(&format!(
            " ORDER BY {column} {direction}, id {direction} LIMIT {limit} OFFSET {offset}",
            column = filter.order_by.column(),
            limit = filter.limit,
            offset = filter.offset,
        ));

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut jobs = stmt
            .query_map(params_from_iter(params), job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        hydrate_attempts(&conn, &mut jobs)?;
        Ok(jobs)
    }

    fn list_jobs_with_statuses(&self, statuses: &[JobStatus]) -> error::Result<Vec<Job>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ({}) \
             ORDER BY created_at DESC, id DESC",
            sql_string_list(statuses.iter().map(|s| s.as_str())),
        );
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        hydrate_attempts(&conn, &mut jobs)?;
        Ok(jobs)
    }

    fn last_job_per_scope(&self, scopes: &[Scope]) -> error::Result<Vec<JobStatusSummary>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=scopes.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        // Top-1-per-group read: one query summarizes every scope's latest
        // replication run.
        let sql = format!(
            "SELECT scope, created_at, status FROM (\
                 SELECT scope, created_at, status, \
                        ROW_NUMBER() OVER (\
                            PARTITION BY scope ORDER BY created_at DESC, id DESC\
                        ) AS rn \
                 FROM jobs \
                 WHERE config_type IN ({}) AND scope IN ({placeholders})\
             ) WHERE rn = 1 ORDER BY scope",
            replication_types_sql(),
        );
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(
                params_from_iter(scopes.iter().map(|s| s.as_str().to_string())),
                |row| {
                    let scope: String = row.get(0)?;
                    let created_at: String = row.get(1)?;
                    let status: String = row.get(2)?;
                    Ok(JobStatusSummary {
                        scope: scope.into(),
                        created_at: dt_from_sql(1, &created_at)?,
                        status: parse_stored(2, &status)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    fn next_pending_job(&self) -> error::Result<Option<Job>> {
        let sql = format!(
            "SELECT id FROM jobs \
             WHERE status = 'pending' \
               AND scope NOT IN (SELECT scope FROM jobs WHERE status IN ({})) \
             ORDER BY created_at ASC, id ASC LIMIT 1",
            sql_string_list([
                JobStatus::Running.as_str(),
                JobStatus::Incomplete.as_str()
            ]),
        );
        let conn = self.lock_conn()?;
        let id: Option<i64> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
        match id {
            Some(id) => Ok(Some(fetch_job(&conn, id)?)),
            None => Ok(None),
        }
    }
}
