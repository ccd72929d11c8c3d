//! Criterion benchmarks for the SQLite job ledger.
//!
//! These measure the operations on the scheduler's hot path: enqueueing,
//! running an attempt to completion, and writing throughput stats.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use runledger_store::{JobLifecycle, JobQueue, SqliteJobStore, StatsAggregator};
use runledger_types::{ConfigType, Scope, StreamDescriptor, StreamSyncStats, SyncStats};

fn bench_job_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/job_lifecycle");

    group.bench_function("enqueue_run_succeed", |b| {
        let store = SqliteJobStore::in_memory().unwrap();
        let config = json!({"streams": ["users"]});
        let mut counter = 0u64;

        b.iter(|| {
            // Fresh scope each iteration so deduplication never skips
            // the insert.
            let scope = Scope::new(format!("bench_conn_{counter}"));
            counter += 1;
            let job_id = store
                .enqueue(&scope, ConfigType::Sync, &config)
                .unwrap()
                .unwrap();
            let n = store.create_attempt(job_id, "/logs/bench").unwrap();
            store.succeed_attempt(job_id, n).unwrap();
        });
    });

    group.bench_function("enqueue_deduplicated", |b| {
        let store = SqliteJobStore::in_memory().unwrap();
        let scope = Scope::new("bench_conn");
        let config = json!({});
        store
            .enqueue(&scope, ConfigType::Sync, &config)
            .unwrap()
            .unwrap();

        b.iter(|| {
            let skipped = store.enqueue(&scope, ConfigType::Sync, &config).unwrap();
            assert!(skipped.is_none());
        });
    });

    group.finish();
}

fn bench_write_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/write_stats");

    for stream_count in [1_i64, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("streams", stream_count),
            &stream_count,
            |b, &stream_count| {
                let store = SqliteJobStore::in_memory().unwrap();
                let job_id = store
                    .enqueue(&Scope::new("bench_conn"), ConfigType::Sync, &json!({}))
                    .unwrap()
                    .unwrap();
                let n = store.create_attempt(job_id, "/logs/bench").unwrap();
                let streams: Vec<StreamSyncStats> = (0..stream_count)
                    .map(|i| StreamSyncStats {
                        descriptor: StreamDescriptor::new(format!("stream_{i}"), None),
                        stats: SyncStats {
                            records_emitted: Some(i),
                            bytes_emitted: Some(i * 100),
                            ..SyncStats::default()
                        },
                    })
                    .collect();
                let totals = SyncStats {
                    records_emitted: Some(1000),
                    bytes_emitted: Some(100_000),
                    ..SyncStats::default()
                };

                b.iter(|| {
                    store.write_stats(job_id, n, &totals, &streams).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_get_attempt_stats_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/get_attempt_stats_batch");

    for job_count in [1_i64, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("jobs", job_count),
            &job_count,
            |b, &job_count| {
                let store = SqliteJobStore::in_memory().unwrap();
                let job_ids: Vec<i64> = (0..job_count)
                    .map(|i| {
                        let job_id = store
                            .enqueue(
                                &Scope::new(format!("bench_conn_{i}")),
                                ConfigType::Sync,
                                &json!({}),
                            )
                            .unwrap()
                            .unwrap();
                        let n = store.create_attempt(job_id, "/logs/bench").unwrap();
                        store
                            .write_stats(
                                job_id,
                                n,
                                &SyncStats {
                                    records_emitted: Some(i),
                                    ..SyncStats::default()
                                },
                                &[StreamSyncStats {
                                    descriptor: StreamDescriptor::new("users", None),
                                    stats: SyncStats::default(),
                                }],
                            )
                            .unwrap();
                        store.succeed_attempt(job_id, n).unwrap();
                        job_id
                    })
                    .collect();

                b.iter(|| {
                    let batch = store.get_attempt_stats_batch(&job_ids).unwrap();
                    assert_eq!(batch.len(), job_ids.len());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_job_lifecycle,
    bench_write_stats,
    bench_get_attempt_stats_batch
);
criterion_main!(benches);
