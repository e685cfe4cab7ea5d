//! Thread pool whose workers each own a long-lived [`Arena`](spork_arena::Arena)
//! and a private [`ScratchPool`](spork_arena::ScratchPool).
//!
//! Tasks are closures over `&mut WorkerContext`. The queue is bounded:
//! [`WorkerPool::submit`] returns [`WorkerError::QueueFull`] rather than
//! blocking. A panicking task is caught, logged, counted in
//! [`WaitSummary::panicked`], and its arena pushes are rolled back; the
//! worker carries on with the next task.
//!
//! ```
//! use spork_worker::{WorkerPool, WorkerPoolConfig};
//!
//! let mut pool = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
//! for i in 0..8u64 {
//!     pool.submit(move |ctx| {
//!         let mut scratch = ctx.scratch().get(&[]).unwrap();
//!         let _ = scratch.push_fmt(format_args!("task {i}"));
//!     })
//!     .unwrap();
//! }
//! assert_eq!(pool.wait().completed, 8);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod pool;

pub use config::WorkerPoolConfig;
pub use context::WorkerContext;
pub use error::WorkerError;
pub use pool::{Task, WaitSummary, WorkerPool};
