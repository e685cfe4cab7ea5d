//! Per-worker state handed to every task.

use spork_arena::{Arena, ArenaConfig, ArenaError, ScratchConfig, ScratchPool};

/// What a task sees of the worker running it.
///
/// The arena lives as long as the worker thread, so data a task pushes
/// stays available to later tasks on the same worker unless the task
/// rolls it back. The scratch pool is private to the worker.
#[derive(Debug)]
pub struct WorkerContext {
    index: usize,
    arena: Arena,
    scratch: ScratchPool,
}

impl WorkerContext {
    pub(crate) fn new(
        index: usize,
        arena: ArenaConfig,
        scratch: ScratchConfig,
    ) -> Result<Self, ArenaError> {
        Ok(Self {
            index,
            arena: Arena::new(arena)?,
            scratch: ScratchPool::new(scratch)?,
        })
    }

    /// Worker index in `0..worker_count`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The worker's long-lived arena.
    pub fn arena(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// The worker's scratch pool.
    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    /// Arena and scratch pool at once, for tasks that build results in the
    /// arena while using scratch memory.
    pub fn split(&mut self) -> (&mut Arena, &ScratchPool) {
        (&mut self.arena, &self.scratch)
    }
}
