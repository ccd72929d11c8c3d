//! Job store error types.

/// Errors produced by job store operations.
///
/// `Sqlite`, `Io`, `Context`, and `LockPoisoned` are storage failures;
/// callers may retry idempotent reads freely but must not blindly retry
/// non-idempotent writes. `JobNotFound`/`AttemptNotFound` mean "nothing to
/// show" and are never worth retrying. `IllegalState` and
/// `InvalidTransition` signal a caller bug or a race the conditional-write
/// layer should have prevented.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No job row exists for the requested id.
    #[error("job not found: {0}")]
    JobNotFound(i64),

    /// No attempt row exists for the requested (job, attempt number).
    #[error("attempt not found: job {job_id}, attempt {attempt_number}")]
    AttemptNotFound { job_id: i64, attempt_number: u32 },

    /// The requested mutation is invalid for the current record state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A job status transition outside the legal-transition table.
    #[error(transparent)]
    InvalidTransition(#[from] runledger_types::InvalidTransition),

    /// A stored enum value no release of this code ever wrote.
    #[error("corrupt stored value: {0}")]
    Corrupt(#[from] runledger_types::UnknownEnumValue),

    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` failure annotated with the operation that hit it.
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure for a config or summary payload.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("job store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Wrap a `SQLite` error with operation context.
    pub fn context(context: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Context { context, source }
    }

    /// Whether this is an underlying storage failure, as opposed to a
    /// not-found or caller-bug condition.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Context { .. } | Self::Io(_) | Self::LockPoisoned
        )
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_and_displays() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = StoreError::context("purge_job_history: begin tx")(inner);
        let msg = err.to_string();
        assert!(msg.contains("purge_job_history"), "got: {msg}");
        assert!(err.is_storage());
    }

    #[test]
    fn not_found_is_not_storage() {
        assert!(!StoreError::JobNotFound(42).is_storage());
        assert!(!StoreError::AttemptNotFound {
            job_id: 1,
            attempt_number: 0
        }
        .is_storage());
    }

    #[test]
    fn illegal_state_displays_message() {
        let err = StoreError::IllegalState("cannot create attempt".into());
        assert_eq!(err.to_string(), "illegal state: cannot create attempt");
        assert!(!err.is_storage());
    }

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            StoreError::LockPoisoned.to_string(),
            "job store lock poisoned"
        );
    }
}
