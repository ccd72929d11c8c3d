//! Durable job and attempt execution ledger.
//!
//! Provides the component traits ([`JobQueue`], [`JobLifecycle`],
//! [`StatsAggregator`], [`RetentionManager`], [`MetadataStore`]) and the
//! [`SqliteJobStore`] implementation backing all of them: scope-level
//! enqueue deduplication, the job/attempt state machine, throughput
//! stats, history retention, and deployment metadata.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod metadata;
pub mod queue;
pub mod retention;
pub mod schema;
pub mod sqlite;
pub mod stats;

pub use backend::{
    JobLifecycle, JobListFilter, JobQueue, MetadataStore, OrderByField, ProtocolVersionRange,
    RetentionManager, SortOrder, StatsAggregator,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Result, StoreError};
pub use retention::RetentionPolicy;
pub use sqlite::SqliteJobStore;
