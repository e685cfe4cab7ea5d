//! Worker pool configuration.

use std::num::NonZeroUsize;

use spork_arena::{ArenaConfig, ScratchConfig};

use crate::error::WorkerError;

/// Configuration for [`WorkerPool`](crate::WorkerPool).
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Number of worker threads. `None` = `available_parallelism`, falling
    /// back to [`FALLBACK_WORKERS`](Self::FALLBACK_WORKERS).
    pub worker_count: Option<usize>,
    /// Capacity of the task queue. `submit` fails instead of blocking when
    /// it is full. Default: 256.
    pub max_tasks: usize,
    /// Configuration of each worker's long-lived arena.
    pub arena: ArenaConfig,
    /// Configuration of each worker's scratch pool.
    pub scratch: ScratchConfig,
}

impl WorkerPoolConfig {
    /// Default task queue capacity.
    pub const DEFAULT_MAX_TASKS: usize = 256;

    /// Worker count when the OS cannot report its parallelism.
    pub const FALLBACK_WORKERS: usize = 4;

    /// Default worker arena reserve: 64 MiB, growable.
    pub const DEFAULT_ARENA_RESERVE: u64 = 64 * 1024 * 1024;

    /// `worker_count` workers with default queue and arena settings.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
            ..Self::default()
        }
    }

    /// Override the queue capacity.
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    /// Override the per-worker arena configuration.
    pub fn with_arena(mut self, arena: ArenaConfig) -> Self {
        self.arena = arena;
        self
    }

    /// Override the per-worker scratch configuration.
    pub fn with_scratch(mut self, scratch: ScratchConfig) -> Self {
        self.scratch = scratch;
        self
    }

    /// Effective number of worker threads.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(Self::FALLBACK_WORKERS)
        })
    }

    /// Check counts and the arena/scratch geometry.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.resolved_worker_count() == 0 {
            return Err(WorkerError::InvalidConfig {
                reason: "worker_count must be at least 1".into(),
            });
        }
        if self.max_tasks == 0 {
            return Err(WorkerError::InvalidConfig {
                reason: "max_tasks must be at least 1".into(),
            });
        }
        self.arena
            .validate()
            .map_err(|e| WorkerError::InvalidConfig {
                reason: format!("worker arena: {e}"),
            })?;
        self.scratch
            .validate()
            .map_err(|e| WorkerError::InvalidConfig {
                reason: format!("worker scratch: {e}"),
            })
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_tasks: Self::DEFAULT_MAX_TASKS,
            arena: ArenaConfig::growable(Self::DEFAULT_ARENA_RESERVE, 0),
            scratch: ScratchConfig::default(),
        }
    }
}
