//! The backend capability and its one-time selection.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

use crate::error::PlatformError;
use crate::heap::HeapMemory;
use crate::virtual_mem::VirtualMemory;

/// Which family of provider a backend belongs to.
///
/// Arenas use this to pick a growth strategy: a virtual-memory backend
/// reserves the whole capacity once and commits on demand, a heap-chain
/// backend links fixed-size blocks as the arena fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Address-space reservation with on-demand commit.
    VirtualMemory,
    /// Ordinary heap blocks; nothing to commit or decommit.
    HeapChain,
}

/// The four-call memory capability plus page size.
///
/// Implementations must hand out page-aligned, zero-filled memory from
/// `reserve` (a virtual-memory reservation reads as zero once committed),
/// and a range committed again after `decommit` must read as zero.
pub trait MemoryBackend: Send + Sync + fmt::Debug {
    /// Provider family.
    fn kind(&self) -> BackendKind;

    /// Granularity of reserve/commit in bytes. Always a power of two.
    fn page_size(&self) -> usize;

    /// Claim `size` bytes (a multiple of [`page_size`](Self::page_size)).
    ///
    /// Virtual-memory providers return an inaccessible range that must be
    /// committed before use; heap providers return usable memory.
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, PlatformError>;

    /// Grant read/write access to `size` bytes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + size` must lie inside a live reservation obtained from
    /// this backend, and `ptr` must be page-aligned.
    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> Result<(), PlatformError>;

    /// Revoke access to `size` bytes and let the OS reclaim the pages.
    ///
    /// # Safety
    ///
    /// Same range requirements as [`commit`](Self::commit). No live
    /// reference may point into the range.
    unsafe fn decommit(&self, ptr: NonNull<u8>, size: usize);

    /// Return a whole reservation.
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must be exactly the values of one earlier
    /// [`reserve`](Self::reserve) call, and the range must not be used
    /// afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// Which provider [`default_backend`] should hand out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendPreference {
    /// Virtual memory where the platform has it, heap chain otherwise.
    #[default]
    Native,
    /// Always the heap chain.
    Heap,
}

impl BackendPreference {
    /// Environment variable consulted by [`from_env`](Self::from_env).
    pub const ENV_VAR: &'static str = "SPORK_ARENA_BACKEND";

    /// Parse a preference name (`native`/`vm`, `heap`/`malloc`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "native" | "vm" | "virtual" => Some(Self::Native),
            "heap" | "malloc" => Some(Self::Heap),
            _ => None,
        }
    }

    /// Read the preference from [`ENV_VAR`](Self::ENV_VAR).
    ///
    /// Unset means [`Native`](Self::Native); unknown values are logged and
    /// treated as `Native`.
    pub fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    var = Self::ENV_VAR,
                    value = %value,
                    "unknown arena backend preference, using native"
                );
                Self::Native
            }),
            Err(_) => Self::Native,
        }
    }
}

/// Page size of the running OS.
pub fn page_size() -> usize {
    crate::virtual_mem::os_page_size()
}

/// The virtual-memory provider, if this target has one.
pub fn native() -> Option<Arc<dyn MemoryBackend>> {
    VirtualMemory::new().map(|vm| Arc::new(vm) as Arc<dyn MemoryBackend>)
}

/// Provider for an explicit preference.
///
/// `Native` falls back to the heap chain on targets without
/// virtual-memory primitives.
pub fn backend_for(preference: BackendPreference) -> Arc<dyn MemoryBackend> {
    match preference {
        BackendPreference::Native => native().unwrap_or_else(|| {
            tracing::debug!("no virtual-memory primitives on this target, using heap chain");
            Arc::new(HeapMemory::new())
        }),
        BackendPreference::Heap => Arc::new(HeapMemory::new()),
    }
}

/// Process-wide default provider, selected on first use.
pub fn default_backend() -> Arc<dyn MemoryBackend> {
    static DEFAULT: OnceLock<Arc<dyn MemoryBackend>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| {
        let preference = BackendPreference::from_env();
        let backend = backend_for(preference);
        tracing::debug!(?preference, kind = ?backend.kind(), "selected default arena backend");
        backend
    }))
}
