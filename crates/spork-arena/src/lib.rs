//! Region allocation for spork.
//!
//! Tensors, layer caches, string building and per-thread training scratch
//! all allocate through this crate. An [`Arena`] bumps a position to hand
//! out memory and frees only by rolling that position back, either
//! explicitly ([`Arena::pop`], [`Arena::pop_to`]) or through a scope
//! ([`TempScope`], [`ScratchScope`]).
//!
//! # Architecture
//!
//! ```text
//! Arena
//! ├── RegionChain (Vec<Region>, head = last)
//! │   └── Region: one VM reservation or one heap block
//! ├── Geometry (page-rounded reserve / block, alignment)
//! └── ErrorReporter (callback + last-error slot)
//!
//! TempScope<'a>     &'a mut Arena + saved position
//! ScratchPool       RefCell<Option<Arena>> × N, lazily created
//! └── ScratchScope  borrowed slot + saved position
//! ```
//!
//! # Backends
//!
//! With the virtual-memory backend the first region reserves the whole
//! capacity and commits a block at a time; popping decommits everything
//! above the block that holds the new position. With the heap backend
//! each region is one block and growth links another. Either way, a
//! growable arena extends its capacity by chaining a further region once
//! the reserve is exhausted.
//!
//! # Errors
//!
//! Every failure is returned as an [`ArenaError`], passed to the arena's
//! [`ErrorCallback`] with its [`ErrorCode`], and kept in a last-error slot
//! that [`Arena::take_error`] clears.
//!
//! Unsafe code is confined to `raw.rs` and `chain.rs`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
mod chain;
pub mod config;
pub mod error;
mod raw;
pub mod report;
pub mod scratch;
mod strings;
pub mod temp;

pub use arena::{Arena, ArenaId};
pub use config::{ArenaConfig, ConfigError, ScratchConfig};
pub use error::{ArenaError, ErrorCode};
pub use report::{ErrorCallback, ErrorReporter};
pub use scratch::{set_thread_scratch_config, with_thread_scratch, ScratchPool, ScratchScope};
pub use spork_platform::{BackendKind, BackendPreference, MemoryBackend};
pub use temp::TempScope;
