//! Instrumented memory backends.
//!
//! [`FaultyBackend`] wraps a real provider, counts every call, and can be
//! told to refuse reservations past a budget or to refuse all commits.
//! Arena tests use it to drive the `MallocFailed`, `CommitFailed` and
//! `InitFailed` paths deterministically.

#![allow(unsafe_code)]

use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use spork_platform::{BackendKind, MemoryBackend, PlatformError};

/// Call counts observed by a [`FaultyBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub reserves: usize,
    pub commits: usize,
    pub decommits: usize,
    pub releases: usize,
}

/// A backend that forwards to `inner` until told to fail.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: Arc<dyn MemoryBackend>,
    /// Remaining successful reservations; `usize::MAX` means unlimited.
    reserve_budget: AtomicUsize,
    fail_commits: AtomicBool,
    reserves: AtomicUsize,
    commits: AtomicUsize,
    decommits: AtomicUsize,
    releases: AtomicUsize,
    live: AtomicUsize,
}

impl FaultyBackend {
    pub fn new(inner: Arc<dyn MemoryBackend>) -> Self {
        Self {
            inner,
            reserve_budget: AtomicUsize::new(usize::MAX),
            fail_commits: AtomicBool::new(false),
            reserves: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            decommits: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Allow `n` more reservations, then fail every further one.
    pub fn allow_reserves(&self, n: usize) {
        self.reserve_budget.store(n, Ordering::SeqCst);
    }

    /// Make every commit fail (or succeed again).
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            reserves: self.reserves.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            decommits: self.decommits.load(Ordering::SeqCst),
            releases: self.releases.load(Ordering::SeqCst),
        }
    }

    /// Reservations not yet released.
    pub fn live_reservations(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn take_reserve_budget(&self) -> bool {
        self.reserve_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl MemoryBackend for FaultyBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn reserve(&self, size: usize) -> Result<NonNull<u8>, PlatformError> {
        if !self.take_reserve_budget() {
            return Err(PlatformError::ReserveFailed {
                size,
                source: io::Error::from(io::ErrorKind::OutOfMemory),
            });
        }
        let ptr = self.inner.reserve(size)?;
        self.reserves.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> Result<(), PlatformError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(PlatformError::CommitFailed {
                size,
                source: io::Error::from(io::ErrorKind::OutOfMemory),
            });
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.commit(ptr, size) }
    }

    unsafe fn decommit(&self, ptr: NonNull<u8>, size: usize) {
        self.decommits.fetch_add(1, Ordering::SeqCst);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.decommit(ptr, size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.release(ptr, size) }
    }
}
