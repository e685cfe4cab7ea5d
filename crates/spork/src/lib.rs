//! Spork: a region allocator with growable chaining, temp scopes, per-thread
//! scratch arenas and arena-owning worker pools.
//!
//! This is the top-level facade crate that re-exports the public API of the
//! spork sub-crates. For most users, adding `spork` as a single dependency
//! is sufficient. The C ABI lives in `spork-ffi`.
//!
//! # Quick start
//!
//! ```rust
//! use spork::prelude::*;
//!
//! // 64 MiB reserve, 1 MiB blocks, may chain past the reserve.
//! let mut arena = Arena::new(ArenaConfig::growable(64 << 20, 1 << 20)).unwrap();
//! let header = arena.push_str("tensor:").unwrap().len();
//! assert_eq!(header, 7);
//!
//! {
//!     let mut scope = arena.temp();
//!     let weights = scope.alloc_slice_copy(&[0.5f32; 256]).unwrap();
//!     assert_eq!(weights.len(), 256);
//! } // everything pushed in the scope is released here
//!
//! // Scratch memory that is guaranteed not to alias `arena`.
//! let id = arena.id();
//! let label = with_thread_scratch(&[id], |scratch| {
//!     scratch.push_fmt(format_args!("{}x{}", 16, 16)).map(|s| s.to_owned())
//! })
//! .unwrap()
//! .unwrap();
//! assert_eq!(label, "16x16");
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`platform`] | `spork-platform` | Memory backends: virtual memory, heap chain |
//! | [`arena`] | `spork-arena` | `Arena`, temp scopes, scratch pools, errors |
//! | [`worker`] | `spork-worker` | Worker pool with per-worker arenas |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Memory backends (`spork-platform`).
///
/// [`platform::MemoryBackend`] is the seam; [`platform::VirtualMemory`]
/// and [`platform::HeapMemory`] are the two providers.
pub use spork_platform as platform;

/// Arenas, temp scopes and scratch pools (`spork-arena`).
pub use spork_arena as arena;

/// Worker pool (`spork-worker`).
///
/// [`worker::WorkerPool`] runs tasks on threads that each own an
/// [`arena::Arena`] and an [`arena::ScratchPool`].
pub use spork_worker as worker;

/// Common imports for typical spork usage.
///
/// ```rust
/// use spork::prelude::*;
/// ```
pub mod prelude {
    // Arenas and scopes
    pub use spork_arena::{Arena, ArenaConfig, ArenaId, ScratchConfig, ScratchPool, TempScope};

    // Thread scratch
    pub use spork_arena::{set_thread_scratch_config, with_thread_scratch};

    // Errors
    pub use spork_arena::{ArenaError, ErrorCallback, ErrorCode};

    // Backends
    pub use spork_platform::{BackendKind, BackendPreference, MemoryBackend};

    // Workers
    pub use spork_worker::{WorkerContext, WorkerPool, WorkerPoolConfig};
}
