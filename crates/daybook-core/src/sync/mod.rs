//! Sync engine, conflict resolution, retry bookkeeping and scheduling.

mod engine;
mod progress;
mod resolver;
mod retry;
mod scheduler;

#[cfg(test)]
mod testing;

pub use engine::{
    BatchSyncResult, SkipReason, SyncEngine, SyncEngineConfig, SyncError, SyncErrorKind,
    SyncOutcome, SyncResult,
};
pub use progress::{SyncProgress, SyncStage};
pub use resolver::{resolve, Resolution, Winner};
pub use retry::{backoff_delay, RetryQueue, RetryQueueEntry};
pub use scheduler::{SchedulerHandle, SyncScheduler};
