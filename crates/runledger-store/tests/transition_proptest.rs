use proptest::prelude::*;
use runledger_store::{JobLifecycle, JobQueue, SqliteJobStore};
use runledger_types::{
    apply_transition, ConfigType, JobStatus, Scope, TransitionOutcome,
};
use serde_json::json;

fn any_status() -> impl Strategy<Value = JobStatus> {
    proptest::sample::select(vec![
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Incomplete,
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ])
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Enqueue,
    CreateAttempt,
    FailAttempt,
    SucceedAttempt,
    Cancel,
    Reset,
}

fn any_op() -> impl Strategy<Value = Op> {
    proptest::sample::select(vec![
        Op::Enqueue,
        Op::CreateAttempt,
        Op::FailAttempt,
        Op::SucceedAttempt,
        Op::Cancel,
        Op::Reset,
    ])
}

proptest! {
    #[test]
    fn terminal_states_absorb_every_request(
        current in any_status().prop_filter("terminal", |s| s.is_terminal()),
        requested in any_status(),
    ) {
        prop_assert_eq!(
            apply_transition(current, requested).unwrap(),
            TransitionOutcome::Ignored
        );
    }

    #[test]
    fn repeated_status_is_ignored(status in any_status()) {
        prop_assert_eq!(
            apply_transition(status, status).unwrap(),
            TransitionOutcome::Ignored
        );
    }

    #[test]
    fn advance_lands_on_the_requested_status(
        current in any_status(),
        requested in any_status(),
    ) {
        if let Ok(TransitionOutcome::Advance(next)) = apply_transition(current, requested) {
            prop_assert_eq!(next, requested);
            prop_assert_ne!(next, current);
        }
    }

    // Drive a store through arbitrary operation sequences on two scopes
    // and check the queue invariant after every step: a scope never holds
    // more than one non-terminal replication job.
    #[test]
    fn at_most_one_non_terminal_replication_job_per_scope(
        ops in proptest::collection::vec((any_op(), any::<bool>()), 1..40)
    ) {
        let store = SqliteJobStore::in_memory().unwrap();
        let scopes = [Scope::new("conn-a"), Scope::new("conn-b")];
        let mut latest: [Option<i64>; 2] = [None, None];

        for (op, pick) in ops {
            let idx = usize::from(pick);
            let scope = &scopes[idx];
            match op {
                Op::Enqueue => {
                    if let Some(id) = store
                        .enqueue(scope, ConfigType::Sync, &json!({}))
                        .unwrap()
                    {
                        latest[idx] = Some(id);
                    }
                }
                Op::CreateAttempt => {
                    if let Some(id) = latest[idx] {
                        // Illegal under a running attempt or terminal job.
                        let _ = store.create_attempt(id, "/logs/p");
                    }
                }
                Op::FailAttempt => {
                    if let Some(id) = latest[idx] {
                        let attempts = store.get_job(id).unwrap().attempt_count();
                        if attempts > 0 {
                            let _ = store.fail_attempt(id, attempts - 1);
                        }
                    }
                }
                Op::SucceedAttempt => {
                    if let Some(id) = latest[idx] {
                        let attempts = store.get_job(id).unwrap().attempt_count();
                        if attempts > 0 {
                            let _ = store.succeed_attempt(id, attempts - 1);
                        }
                    }
                }
                Op::Cancel => {
                    if let Some(id) = latest[idx] {
                        store.cancel_job(id).unwrap();
                    }
                }
                Op::Reset => {
                    if let Some(id) = latest[idx] {
                        store.reset_job(id).unwrap();
                    }
                }
            }

            for scope in &scopes {
                let non_terminal = store
                    .list_jobs_with_statuses(&JobStatus::NON_TERMINAL)
                    .unwrap()
                    .into_iter()
                    .filter(|job| &job.scope == scope)
                    .count();
                prop_assert!(
                    non_terminal <= 1,
                    "scope {scope} holds {non_terminal} non-terminal jobs"
                );
            }
        }
    }
}
