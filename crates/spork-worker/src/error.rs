//! Worker pool errors.

use std::io;

use spork_arena::ArenaError;

/// Errors from building or feeding a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The configuration was rejected.
    #[error("invalid worker pool configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),
    /// A worker could not create its arena or scratch pool.
    #[error("worker arena setup failed")]
    Arena(#[from] ArenaError),
    /// The task queue is full.
    #[error("task queue full ({capacity} tasks)")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },
    /// Every worker has exited; no task can run.
    #[error("worker pool is shut down")]
    ShutDown,
}
