//! Memory backends for spork arenas.
//!
//! Every arena in the workspace draws its memory through the
//! [`MemoryBackend`] capability: `reserve`, `commit`, `decommit`,
//! `release` and `page_size`. Two providers implement it:
//!
//! ```text
//! MemoryBackend (trait)
//! ├── VirtualMemory  mmap/mprotect/madvise (Unix), VirtualAlloc (Windows)
//! └── HeapMemory     page-aligned heap blocks, commit/decommit are no-ops
//! ```
//!
//! The backend is chosen once, when an arena is constructed, either
//! explicitly or through [`default_backend`], which honours the
//! `SPORK_ARENA_BACKEND` environment variable.
//!
//! This crate is one of the few in the workspace allowed to contain
//! `unsafe` code. It is confined to `heap.rs` and `virtual_mem.rs`, plus
//! the `unsafe fn` declarations of the trait in `backend.rs`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod heap;
pub mod virtual_mem;

pub use backend::{
    backend_for, default_backend, native, page_size, BackendKind, BackendPreference,
    MemoryBackend,
};
pub use error::PlatformError;
pub use heap::HeapMemory;
pub use virtual_mem::VirtualMemory;

/// Page size assumed when the OS cannot be queried.
pub const FALLBACK_PAGE_SIZE: usize = 4096;

/// Round `value` up to a multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
pub fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}
