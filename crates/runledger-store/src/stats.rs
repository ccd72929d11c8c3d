//! Attempt output and throughput counters.
//!
//! `sync_stats` and `stream_stats` carry no uniqueness constraint
//! (historical duplicate rows are tolerated), so writes check existence
//! explicitly and branch between INSERT and UPDATE inside one
//! transaction.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row};
use runledger_types::{
    AttemptFailureSummary, AttemptStats, JobAttemptPair, NormalizationSummary, StreamDescriptor,
    StreamSyncStats, SyncStats,
};

use crate::backend::StatsAggregator;
use crate::error::{self, StoreError};
use crate::sqlite::{
    attempt_row_id, opt_dt_from_sql, require_attempt_id, to_sqlite, SqliteJobStore,
};

pub(crate) const SYNC_STATS_COLUMNS: &str = "records_emitted, bytes_emitted, records_committed, \
     bytes_committed, estimated_records, estimated_bytes, source_state_messages_emitted, \
     destination_state_messages_emitted, max_seconds_before_source_state_message_emitted, \
     mean_seconds_before_source_state_message_emitted, \
     max_seconds_between_state_message_emitted_and_committed, \
     mean_seconds_between_state_message_emitted_and_committed";

const STREAM_COUNTER_COLUMNS: &str = "records_emitted, bytes_emitted, records_committed, \
     bytes_committed, estimated_records, estimated_bytes";

/// Strip null characters, literal and JSON-escaped. SQLite text columns
/// cannot hold them and some connectors emit them in error payloads.
pub(crate) fn strip_unsupported_unicode(value: &str) -> String {
    value.replace('\u{0}', "").replace("\\u0000", "")
}

/// Map the twelve counter columns starting at `offset`.
pub(crate) fn sync_stats_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<SyncStats> {
    Ok(SyncStats {
        records_emitted: row.get(offset)?,
        bytes_emitted: row.get(offset + 1)?,
        records_committed: row.get(offset + 2)?,
        bytes_committed: row.get(offset + 3)?,
        estimated_records: row.get(offset + 4)?,
        estimated_bytes: row.get(offset + 5)?,
        source_state_messages_emitted: row.get(offset + 6)?,
        destination_state_messages_emitted: row.get(offset + 7)?,
        max_seconds_before_source_state_message_emitted: row.get(offset + 8)?,
        mean_seconds_before_source_state_message_emitted: row.get(offset + 9)?,
        max_seconds_between_state_message_emitted_and_committed: row.get(offset + 10)?,
        mean_seconds_between_state_message_emitted_and_committed: row.get(offset + 11)?,
    })
}

/// Map the six stream counter columns starting at `offset`; the
/// state-message gauges do not exist per stream.
fn stream_counters_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<SyncStats> {
    Ok(SyncStats {
        records_emitted: row.get(offset)?,
        bytes_emitted: row.get(offset + 1)?,
        records_committed: row.get(offset + 2)?,
        bytes_committed: row.get(offset + 3)?,
        estimated_records: row.get(offset + 4)?,
        estimated_bytes: row.get(offset + 5)?,
        ..SyncStats::default()
    })
}

fn save_sync_stats(
    conn: &Connection,
    now: &str,
    attempt_id: i64,
    stats: &SyncStats,
) -> error::Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sync_stats WHERE attempt_id = ?1)",
        params![attempt_id],
        |row| row.get(0),
    )?;
    if exists {
        conn.execute(
            "UPDATE sync_stats SET \
                 records_emitted = ?1, bytes_emitted = ?2, records_committed = ?3, \
                 bytes_committed = ?4, estimated_records = ?5, estimated_bytes = ?6, \
                 source_state_messages_emitted = ?7, destination_state_messages_emitted = ?8, \
                 max_seconds_before_source_state_message_emitted = ?9, \
                 mean_seconds_before_source_state_message_emitted = ?10, \
                 max_seconds_between_state_message_emitted_and_committed = ?11, \
                 mean_seconds_between_state_message_emitted_and_committed = ?12, \
                 updated_at = ?13 \
             WHERE attempt_id = ?14",
            params![
                stats.records_emitted,
                stats.bytes_emitted,
                stats.records_committed,
                stats.bytes_committed,
                stats.estimated_records,
                stats.estimated_bytes,
                stats.source_state_messages_emitted,
                stats.destination_state_messages_emitted,
                stats.max_seconds_before_source_state_message_emitted,
                stats.mean_seconds_before_source_state_message_emitted,
                stats.max_seconds_between_state_message_emitted_and_committed,
                stats.mean_seconds_between_state_message_emitted_and_committed,
                now,
                attempt_id,
            ],
        )?;
    } else {
        conn.execute(
            &format!(
                "INSERT INTO sync_stats (attempt_id, {SYNC_STATS_COLUMNS}, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)"
            ),
            params![
                attempt_id,
                stats.records_emitted,
                stats.bytes_emitted,
                stats.records_committed,
                stats.bytes_committed,
                stats.estimated_records,
                stats.estimated_bytes,
                stats.source_state_messages_emitted,
                stats.destination_state_messages_emitted,
                stats.max_seconds_before_source_state_message_emitted,
                stats.mean_seconds_before_source_state_message_emitted,
                stats.max_seconds_between_state_message_emitted_and_committed,
                stats.mean_seconds_between_state_message_emitted_and_committed,
                now,
            ],
        )?;
    }
    Ok(())
}

fn save_stream_stats_batch(
    conn: &Connection,
    now: &str,
    attempt_id: i64,
    streams: &[StreamSyncStats],
) -> error::Result<()> {
    if streams.is_empty() {
        return Ok(());
    }
    // One existence query for all streams of this attempt, not one per
    // stream.
    let mut stmt = conn.prepare(
        "SELECT stream_name, stream_namespace FROM stream_stats WHERE attempt_id = ?1",
    )?;
    let existing: HashSet<StreamDescriptor> = stmt
        .query_map(params![attempt_id], |row| {
            Ok(StreamDescriptor::new(
                row.get::<_, String>(0)?,
                row.get(1)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    for stream in streams {
        let counters = &stream.stats;
        let descriptor = &stream.descriptor;
        if existing.contains(descriptor) {
            // A NULL namespace must match NULL, which `=` never does.
            conn.execute(
                "UPDATE stream_stats SET \
                     records_emitted = ?1, bytes_emitted = ?2, records_committed = ?3, \
                     bytes_committed = ?4, estimated_records = ?5, estimated_bytes = ?6, \
                     updated_at = ?7 \
                 WHERE attempt_id = ?8 AND stream_name = ?9 \
                   AND ((?10 IS NULL AND stream_namespace IS NULL) OR stream_namespace = ?10)",
                params![
                    counters.records_emitted,
                    counters.bytes_emitted,
                    counters.records_committed,
                    counters.bytes_committed,
                    counters.estimated_records,
                    counters.estimated_bytes,
                    now,
                    attempt_id,
                    descriptor.name,
                    descriptor.namespace,
                ],
            )?;
        } else {
            conn.execute(
                &format!(
                    "INSERT INTO stream_stats \
                     (attempt_id, stream_name, stream_namespace, {STREAM_COUNTER_COLUMNS}, \
                      created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)"
                ),
                params![
                    attempt_id,
                    descriptor.name,
                    descriptor.namespace,
                    counters.records_emitted,
                    counters.bytes_emitted,
                    counters.records_committed,
                    counters.bytes_committed,
                    counters.estimated_records,
                    counters.estimated_bytes,
                    now,
                ],
            )?;
        }
    }
    Ok(())
}

impl StatsAggregator for SqliteJobStore {
    fn write_output(
        &self,
        job_id: i64,
        attempt_number: u32,
        output: &serde_json::Value,
        total_stats: Option<&SyncStats>,
        stream_stats: &[StreamSyncStats],
    ) -> error::Result<()> {
        let output_json = strip_unsupported_unicode(&serde_json::to_string(output)?);
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;

        let attempt_id = require_attempt_id(&tx, job_id, attempt_number)?;
        tx.execute(
            "UPDATE attempts SET output = ?1, updated_at = ?2 WHERE id = ?3",
            params![output_json, now, attempt_id],
        )?;
        tx.execute(
            "UPDATE jobs SET updated_at = ?1 WHERE id = ?2",
            params![now, job_id],
        )?;
        if let Some(stats) = total_stats {
            save_sync_stats(&tx, &now, attempt_id, stats)?;
        }
        save_stream_stats_batch(&tx, &now, attempt_id, stream_stats)?;
        tx.commit()?;
        Ok(())
    }

    fn write_stats(
        &self,
        job_id: i64,
        attempt_number: u32,
        total_stats: &SyncStats,
        stream_stats: &[StreamSyncStats],
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;
        let attempt_id = require_attempt_id(&tx, job_id, attempt_number)?;
        save_sync_stats(&tx, &now, attempt_id, total_stats)?;
        save_stream_stats_batch(&tx, &now, attempt_id, stream_stats)?;
        tx.commit()?;
        Ok(())
    }

    fn write_attempt_failure_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
        summary: &AttemptFailureSummary,
    ) -> error::Result<()> {
        let json = strip_unsupported_unicode(&serde_json::to_string(summary)?);
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let changed = conn.execute(
            "UPDATE attempts SET failure_summary = ?1, updated_at = ?2 \
             WHERE job_id = ?3 AND attempt_number = ?4",
            params![json, now, job_id, attempt_number],
        )?;
        if changed == 0 {
            return Err(StoreError::AttemptNotFound {
                job_id,
                attempt_number,
            });
        }
        Ok(())
    }

    fn write_normalization_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
        summary: &NormalizationSummary,
    ) -> error::Result<()> {
        let failures = summary
            .failures
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.lock_conn()?;
        let now = self.now_sqlite();
        let tx = conn.unchecked_transaction()?;
        let attempt_id = require_attempt_id(&tx, job_id, attempt_number)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM normalization_summaries WHERE attempt_id = ?1)",
            params![attempt_id],
            |row| row.get(0),
        )?;
        let start_time = summary.start_time.map(to_sqlite);
        let end_time = summary.end_time.map(to_sqlite);
        if exists {
            tx.execute(
                "UPDATE normalization_summaries \
                 SET start_time = ?1, end_time = ?2, failures = ?3, updated_at = ?4 \
                 WHERE attempt_id = ?5",
                params![start_time, end_time, failures, now, attempt_id],
            )?;
        } else {
            tx.execute(
                "INSERT INTO normalization_summaries \
                 (attempt_id, start_time, end_time, failures, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![attempt_id, start_time, end_time, failures, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_normalization_summary(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<NormalizationSummary>> {
        let conn = self.lock_conn()?;
        let Some(attempt_id) = attempt_row_id(&conn, job_id, attempt_number)? else {
            return Ok(None);
        };
        let summary = conn
            .query_row(
                "SELECT start_time, end_time, failures FROM normalization_summaries \
                 WHERE attempt_id = ?1 ORDER BY id DESC LIMIT 1",
                params![attempt_id],
                |row| {
                    let start_time: Option<String> = row.get(0)?;
                    let end_time: Option<String> = row.get(1)?;
                    let failures: Option<String> = row.get(2)?;
                    Ok((start_time, end_time, failures))
                },
            )
            .optional()?;
        let Some((start_time, end_time, failures)) = summary else {
            return Ok(None);
        };
        Ok(Some(NormalizationSummary {
            start_time: opt_dt_from_sql(0, start_time)?,
            end_time: opt_dt_from_sql(1, end_time)?,
            failures: failures
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?,
        }))
    }

    fn get_attempt_stats(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<AttemptStats> {
        let conn = self.lock_conn()?;
        let Some(attempt_id) = attempt_row_id(&conn, job_id, attempt_number)? else {
            return Ok(AttemptStats::default());
        };
        let combined = conn
            .query_row(
                &format!(
                    "SELECT {SYNC_STATS_COLUMNS} FROM sync_stats \
                     WHERE attempt_id = ?1 ORDER BY id DESC LIMIT 1"
                ),
                params![attempt_id],
                |row| sync_stats_from_row(row, 0),
            )
            .optional()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT stream_name, stream_namespace, {STREAM_COUNTER_COLUMNS} \
             FROM stream_stats WHERE attempt_id = ?1 ORDER BY stream_name, stream_namespace"
        ))?;
        let per_stream = stmt
            .query_map(params![attempt_id], |row| {
                Ok(StreamSyncStats {
                    descriptor: StreamDescriptor::new(row.get::<_, String>(0)?, row.get(1)?),
                    stats: stream_counters_from_row(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(AttemptStats {
            combined,
            per_stream,
        })
    }

    fn get_attempt_stats_batch(
        &self,
        job_ids: &[i64],
    ) -> error::Result<HashMap<JobAttemptPair, AttemptStats>> {
        let mut result: HashMap<JobAttemptPair, AttemptStats> = HashMap::new();
        if job_ids.is_empty() {
            return Ok(result);
        }
        let ids = job_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.lock_conn()?;

        // Two join queries total, regardless of how many jobs are asked
        // for.
        let mut stmt = conn.prepare(&format!(
            "SELECT a.job_id, a.attempt_number, {cols} \
             FROM sync_stats s JOIN attempts a ON a.id = s.attempt_id \
             WHERE a.job_id IN ({ids}) ORDER BY s.id",
            cols = SYNC_STATS_COLUMNS
                .split(", ")
                .map(|c| format!("s.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", "),
        ))?;
        let combined_rows = stmt.query_map([], |row| {
            let pair = JobAttemptPair {
                job_id: row.get(0)?,
                attempt_number: row.get(1)?,
            };
            Ok((pair, sync_stats_from_row(row, 2)?))
        })?;
        for entry in combined_rows {
            let (pair, stats) = entry?;
            // Later duplicate rows win, matching the single-attempt read.
            result.entry(pair).or_default().combined = Some(stats);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT a.job_id, a.attempt_number, s.stream_name, s.stream_namespace, \
                    s.records_emitted, s.bytes_emitted, s.records_committed, \
                    s.bytes_committed, s.estimated_records, s.estimated_bytes \
             FROM stream_stats s JOIN attempts a ON a.id = s.attempt_id \
             WHERE a.job_id IN ({ids}) ORDER BY s.id"
        ))?;
        let stream_rows = stmt.query_map([], |row| {
            let pair = JobAttemptPair {
                job_id: row.get(0)?,
                attempt_number: row.get(1)?,
            };
            Ok((
                pair,
                StreamSyncStats {
                    descriptor: StreamDescriptor::new(row.get::<_, String>(2)?, row.get(3)?),
                    stats: stream_counters_from_row(row, 4)?,
                },
            ))
        })?;
        for entry in stream_rows {
            let (pair, stream) = entry?;
            match result.get_mut(&pair) {
                Some(stats) => stats.per_stream.push(stream),
                None => {
                    tracing::error!(
                        %pair,
                        stream = %stream.descriptor.name,
                        "stream stats entry has no matching sync stats entry, skipping"
                    );
                }
            }
        }
        Ok(result)
    }

    fn get_attempt_combined_stats(
        &self,
        job_id: i64,
        attempt_number: u32,
    ) -> error::Result<Option<SyncStats>> {
        let conn = self.lock_conn()?;
        let Some(attempt_id) = attempt_row_id(&conn, job_id, attempt_number)? else {
            return Ok(None);
        };
        let stats = conn
            .query_row(
                &format!(
                    "SELECT {SYNC_STATS_COLUMNS} FROM sync_stats \
                     WHERE attempt_id = ?1 ORDER BY id DESC LIMIT 1"
                ),
                params![attempt_id],
                |row| sync_stats_from_row(row, 0),
            )
            .optional()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JobLifecycle, JobQueue};
    use chrono::{TimeZone, Utc};
    use runledger_types::{ConfigType, FailureReason, Scope};
    use serde_json::json;

    fn store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn attempt(store: &SqliteJobStore, scope: &str) -> (i64, u32) {
        let job_id = store
            .enqueue(&Scope::new(scope), ConfigType::Sync, &json!({}))
            .unwrap()
            .unwrap();
        let n = store.create_attempt(job_id, "/logs/a/0").unwrap();
        (job_id, n)
    }

    fn counters(records: i64, bytes: i64) -> SyncStats {
        SyncStats {
            records_emitted: Some(records),
            bytes_emitted: Some(bytes),
            ..SyncStats::default()
        }
    }

    fn users_stream(records: i64) -> StreamSyncStats {
        StreamSyncStats {
            descriptor: StreamDescriptor::new("users", None),
            stats: counters(records, records * 10),
        }
    }

    #[test]
    fn write_then_read_combined_stats() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");

        store
            .write_stats(job_id, n, &counters(100, 4096), &[])
            .unwrap();
        let read = store.get_attempt_combined_stats(job_id, n).unwrap().unwrap();
        assert_eq!(read.records_emitted, Some(100));
        assert_eq!(read.bytes_emitted, Some(4096));
    }

    #[test]
    fn rewriting_stats_updates_instead_of_duplicating() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");

        store
            .write_stats(job_id, n, &counters(10, 100), &[users_stream(5)])
            .unwrap();
        store
            .write_stats(job_id, n, &counters(20, 200), &[users_stream(15)])
            .unwrap();

        let stats = store.get_attempt_stats(job_id, n).unwrap();
        assert_eq!(stats.combined.unwrap().records_emitted, Some(20));
        assert_eq!(stats.per_stream.len(), 1);
        assert_eq!(stats.per_stream[0].stats.records_emitted, Some(15));
    }

    #[test]
    fn streams_are_keyed_by_name_and_namespace() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");

        let with_ns = StreamSyncStats {
            descriptor: StreamDescriptor::new("users", Some("raw".into())),
            stats: counters(1, 1),
        };
        store
            .write_stats(job_id, n, &counters(2, 2), &[users_stream(1), with_ns])
            .unwrap();

        let stats = store.get_attempt_stats(job_id, n).unwrap();
        // Same name, NULL vs. set namespace: two distinct rows.
        assert_eq!(stats.per_stream.len(), 2);
    }

    #[test]
    fn write_output_persists_payload_and_stats() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");

        let output = json!({"standard_sync_summary": {"records_synced": 7}});
        store
            .write_output(job_id, n, &output, Some(&counters(7, 70)), &[users_stream(7)])
            .unwrap();

        let attempt = store.get_attempt(job_id, n).unwrap().unwrap();
        assert_eq!(attempt.output, Some(output));
        let stats = store.get_attempt_stats(job_id, n).unwrap();
        assert_eq!(stats.combined.unwrap().records_emitted, Some(7));
        assert_eq!(stats.per_stream.len(), 1);
    }

    #[test]
    fn stats_write_for_missing_attempt_is_not_found() {
        let store = store();
        let err = store
            .write_stats(999, 0, &counters(1, 1), &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::AttemptNotFound { .. }));
    }

    #[test]
    fn failure_summary_strips_null_characters() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");

        let summary = AttemptFailureSummary {
            failures: vec![FailureReason {
                failure_origin: Some("source".into()),
                failure_type: Some("system_error".into()),
                internal_message: Some("bad\u{0}byte".into()),
                external_message: None,
                timestamp: Some(1_700_000_000_000),
            }],
            partial_success: Some(false),
        };
        store
            .write_attempt_failure_summary(job_id, n, &summary)
            .unwrap();

        let attempt = store.get_attempt(job_id, n).unwrap().unwrap();
        let stored = attempt.failure_summary.unwrap();
        // The serialized NUL escape was removed before persisting.
        assert_eq!(
            stored.failures[0].internal_message.as_deref(),
            Some("badbyte")
        );
        assert_eq!(stored.partial_success, Some(false));
    }

    #[test]
    fn normalization_summary_round_trips_and_upserts() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");
        assert!(store.get_normalization_summary(job_id, n).unwrap().is_none());

        let start = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 8, 5, 0).unwrap();
        store
            .write_normalization_summary(
                job_id,
                n,
                &NormalizationSummary {
                    start_time: Some(start),
                    end_time: Some(end),
                    failures: None,
                },
            )
            .unwrap();
        store
            .write_normalization_summary(
                job_id,
                n,
                &NormalizationSummary {
                    start_time: Some(start),
                    end_time: Some(end),
                    failures: Some(vec![FailureReason {
                        failure_origin: Some("normalization".into()),
                        failure_type: None,
                        internal_message: None,
                        external_message: Some("dbt failed".into()),
                        timestamp: None,
                    }]),
                },
            )
            .unwrap();

        let summary = store.get_normalization_summary(job_id, n).unwrap().unwrap();
        assert_eq!(summary.start_time, Some(start));
        assert_eq!(summary.failures.map(|f| f.len()), Some(1));
    }

    #[test]
    fn batch_stats_match_per_attempt_reads() {
        let store = store();
        let (job_a, n_a) = attempt(&store, "conn-a");
        store
            .write_stats(job_a, n_a, &counters(10, 100), &[users_stream(10)])
            .unwrap();
        let (job_b, n_b) = attempt(&store, "conn-b");
        store.write_stats(job_b, n_b, &counters(3, 30), &[]).unwrap();

        let batch = store.get_attempt_stats_batch(&[job_a, job_b]).unwrap();
        assert_eq!(batch.len(), 2);
        let a = &batch[&JobAttemptPair {
            job_id: job_a,
            attempt_number: n_a,
        }];
        assert_eq!(a.combined.as_ref().unwrap().records_emitted, Some(10));
        assert_eq!(a.per_stream.len(), 1);
        let b = &batch[&JobAttemptPair {
            job_id: job_b,
            attempt_number: n_b,
        }];
        assert_eq!(b.combined.as_ref().unwrap().records_emitted, Some(3));
        assert!(b.per_stream.is_empty());
    }

    #[test]
    fn batch_skips_orphan_stream_rows() {
        let store = store();
        let (job_id, n) = attempt(&store, "conn-1");
        // Stream rows with no combined entry are a consistency anomaly,
        // simulated here by writing streams without total stats.
        store
            .write_output(job_id, n, &json!({}), None, &[users_stream(4)])
            .unwrap();

        let batch = store.get_attempt_stats_batch(&[job_id]).unwrap();
        assert!(batch.is_empty());
        // The single-attempt read still surfaces the stream rows.
        let single = store.get_attempt_stats(job_id, n).unwrap();
        assert!(single.combined.is_none());
        assert_eq!(single.per_stream.len(), 1);
    }

    #[test]
    fn strip_unsupported_unicode_removes_both_forms() {
        assert_eq!(strip_unsupported_unicode("a\u{0}b"), "ab");
        assert_eq!(strip_unsupported_unicode("a\\u0000b"), "ab");
        assert_eq!(strip_unsupported_unicode("plain"), "plain");
    }
}
