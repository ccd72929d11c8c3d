//! End-to-end ledger walk-through: enqueue, retry after a failed
//! attempt, succeed, and requeue.

use runledger_store::{
    JobLifecycle, JobQueue, SqliteJobStore, StatsAggregator,
};
use runledger_types::{
    AttemptStatus, ConfigType, JobStatus, Scope, StreamDescriptor, StreamSyncStats, SyncStats,
};
use serde_json::json;

#[test]
fn full_job_lifecycle_with_retry() {
    let store = SqliteJobStore::in_memory().unwrap();
    let scope = Scope::new("conn-1");
    let config = json!({"streams": ["users", "orders"]});

    let job_id = store
        .enqueue(&scope, ConfigType::Sync, &config)
        .unwrap()
        .expect("first enqueue creates a job");
    assert_eq!(store.get_job(job_id).unwrap().status, JobStatus::Pending);

    // A second enqueue before the job terminates is a silent no-op.
    assert!(store.enqueue(&scope, ConfigType::Sync, &config).unwrap().is_none());

    // First attempt runs and fails; the job parks as incomplete.
    let first = store.create_attempt(job_id, "/logs/1/0").unwrap();
    assert_eq!(first, 0);
    assert_eq!(store.get_job(job_id).unwrap().status, JobStatus::Running);

    store.fail_attempt(job_id, first).unwrap();
    let job = store.get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Incomplete);
    assert_eq!(job.attempts[0].status, AttemptStatus::Failed);

    // Retry: the incomplete job accepts a new attempt with the next
    // dense number.
    let second = store.create_attempt(job_id, "/logs/1/1").unwrap();
    assert_eq!(second, 1);

    let stats = SyncStats {
        records_emitted: Some(42),
        bytes_emitted: Some(4200),
        records_committed: Some(42),
        ..SyncStats::default()
    };
    let streams = vec![StreamSyncStats {
        descriptor: StreamDescriptor::new("users", Some("raw".into())),
        stats: stats.clone(),
    }];
    store
        .write_output(
            job_id,
            second,
            &json!({"records_synced": 42}),
            Some(&stats),
            &streams,
        )
        .unwrap();

    store.succeed_attempt(job_id, second).unwrap();
    let job = store.get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempts.len(), 2);
    assert_eq!(job.attempts[1].status, AttemptStatus::Succeeded);

    let read = store.get_attempt_stats(job_id, second).unwrap();
    assert_eq!(read.combined, Some(stats));
    assert_eq!(read.per_stream, streams);

    // The terminal job no longer blocks its scope.
    let requeued = store
        .enqueue(&scope, ConfigType::Sync, &config)
        .unwrap()
        .expect("scope is free again");
    assert_ne!(requeued, job_id);
}

#[test]
fn dispatch_order_respects_scope_blocking() {
    let store = SqliteJobStore::in_memory().unwrap();
    let config = json!({});

    let first = store
        .enqueue(&Scope::new("conn-a"), ConfigType::Sync, &config)
        .unwrap()
        .unwrap();
    let second = store
        .enqueue(&Scope::new("conn-b"), ConfigType::Sync, &config)
        .unwrap()
        .unwrap();

    assert_eq!(store.next_pending_job().unwrap().unwrap().id, first);

    let n = store.create_attempt(first, "/logs/a/0").unwrap();
    assert_eq!(store.next_pending_job().unwrap().unwrap().id, second);

    // An incomplete job still blocks its scope.
    store.fail_attempt(first, n).unwrap();
    assert_eq!(store.next_pending_job().unwrap().unwrap().id, second);
}
