//! The worker pool.
//!
//! ```text
//!   submit() ──try_send──▶ [tasks: bounded(max_tasks)] ──recv──▶ worker 0..N
//!                                                                   │
//!   wait()   ◀────recv──── [done: unbounded] ◀───TaskOutcome────────┘
//! ```
//!
//! Each worker builds its [`WorkerContext`] on its own thread and reports
//! back before the pool is returned, so a pool that constructs
//! successfully has every arena in place.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use spork_arena::ArenaError;

use crate::config::WorkerPoolConfig;
use crate::context::WorkerContext;
use crate::error::WorkerError;

/// A unit of work.
pub type Task = Box<dyn FnOnce(&mut WorkerContext) + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskOutcome {
    Completed,
    Panicked,
}

/// Tally returned by [`WorkerPool::wait`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaitSummary {
    /// Tasks that returned normally.
    pub completed: usize,
    /// Tasks that panicked. Their worker survives.
    pub panicked: usize,
}

impl WaitSummary {
    /// Total tasks accounted for.
    pub fn total(&self) -> usize {
        self.completed + self.panicked
    }
}

/// Fixed-size pool of worker threads fed through a bounded queue.
pub struct WorkerPool {
    tasks: Option<Sender<Task>>,
    done: Receiver<TaskOutcome>,
    outstanding: AtomicUsize,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Validate `config`, start the workers and wait until each has built
    /// its arena and scratch pool.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, WorkerError> {
        config.validate()?;
        let count = config.resolved_worker_count();
        let (task_tx, task_rx) = crossbeam_channel::bounded::<Task>(config.max_tasks);
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), ArenaError>>(count);

        let mut pool = Self {
            tasks: Some(task_tx),
            done: done_rx,
            outstanding: AtomicUsize::new(0),
            capacity: config.max_tasks,
            workers: Vec::with_capacity(count),
        };

        for index in 0..count {
            let config = config.clone();
            let tasks = task_rx.clone();
            let done = done_tx.clone();
            let ready = ready_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("spork-worker-{index}"))
                .spawn(move || worker_main(index, config, tasks, done, ready))
                .map_err(WorkerError::Spawn)?;
            pool.workers.push(handle);
        }
        drop(ready_tx);

        for _ in 0..count {
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(WorkerError::Arena(err)),
                Err(_) => return Err(WorkerError::ShutDown),
            }
        }
        tracing::debug!(workers = count, max_tasks = config.max_tasks, "worker pool started");
        Ok(pool)
    }

    /// Queue `task` without blocking.
    ///
    /// Fails with [`WorkerError::QueueFull`] when `max_tasks` tasks are
    /// already waiting.
    pub fn submit<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&mut WorkerContext) + Send + 'static,
    {
        let tasks = self.tasks.as_ref().ok_or(WorkerError::ShutDown)?;
        match tasks.try_send(Box::new(task)) {
            Ok(()) => {
                self.outstanding.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(WorkerError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::ShutDown),
        }
    }

    /// Block until every submitted task has finished.
    pub fn wait(&mut self) -> WaitSummary {
        let mut summary = WaitSummary::default();
        while self.outstanding.load(Ordering::Acquire) > 0 {
            match self.done.recv() {
                Ok(TaskOutcome::Completed) => summary.completed += 1,
                Ok(TaskOutcome::Panicked) => summary.panicked += 1,
                Err(_) => break,
            }
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
        summary
    }

    /// Tasks submitted but not yet collected by [`wait`](Self::wait).
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Finish outstanding tasks, stop the workers and join them.
    pub fn shutdown(mut self) -> WaitSummary {
        let summary = self.wait();
        self.close();
        summary
    }

    fn close(&mut self) {
        // Dropping the sender ends every worker's receive loop.
        self.tasks = None;
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                tracing::error!(worker = ?name, "worker thread panicked outside a task");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("capacity", &self.capacity)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

fn worker_main(
    index: usize,
    config: WorkerPoolConfig,
    tasks: Receiver<Task>,
    done: Sender<TaskOutcome>,
    ready: Sender<Result<(), ArenaError>>,
) {
    let mut ctx = match WorkerContext::new(index, config.arena, config.scratch) {
        Ok(ctx) => {
            let _ = ready.send(Ok(()));
            ctx
        }
        Err(err) => {
            tracing::error!(worker = index, error = %err, "worker setup failed");
            let _ = ready.send(Err(err));
            return;
        }
    };
    drop(ready);

    for task in tasks.iter() {
        let start = ctx.arena().pos();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task(&mut ctx))) {
            Ok(()) => TaskOutcome::Completed,
            Err(payload) => {
                tracing::error!(
                    worker = index,
                    panic = panic_message(payload.as_ref()),
                    "task panicked"
                );
                // Whatever the task pushed before panicking is discarded.
                ctx.arena().pop_to(start);
                TaskOutcome::Panicked
            }
        };
        if done.send(outcome).is_err() {
            break;
        }
    }
    tracing::trace!(worker = index, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
