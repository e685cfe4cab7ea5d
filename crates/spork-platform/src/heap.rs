//! Heap-chain provider.
//!
//! Blocks come from the global allocator, page-aligned and zeroed. Commit
//! and decommit are no-ops: a heap block is fully usable from the moment
//! it is reserved.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::io;
use std::ptr::NonNull;

use crate::backend::{BackendKind, MemoryBackend};
use crate::error::PlatformError;

/// Page-aligned heap blocks.
#[derive(Clone, Debug)]
pub struct HeapMemory {
    page_size: usize,
}

impl HeapMemory {
    /// Heap provider using the OS page size as block alignment.
    pub fn new() -> Self {
        Self::with_page_size(crate::backend::page_size())
    }

    /// Heap provider with an explicit granularity (a power of two).
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(
            page_size.is_power_of_two(),
            "page size must be a power of two, got {page_size}"
        );
        Self { page_size }
    }

    fn layout(&self, size: usize) -> Result<Layout, PlatformError> {
        if size == 0 {
            return Err(PlatformError::InvalidLayout {
                size,
                align: self.page_size,
            });
        }
        Layout::from_size_align(size, self.page_size).map_err(|_| PlatformError::InvalidLayout {
            size,
            align: self.page_size,
        })
    }
}

impl Default for HeapMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend for HeapMemory {
    fn kind(&self) -> BackendKind {
        BackendKind::HeapChain
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn reserve(&self, size: usize) -> Result<NonNull<u8>, PlatformError> {
        let layout = self.layout(size)?;
        // SAFETY: layout has non-zero size (checked in `layout`).
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| {
            PlatformError::reserve(size, io::Error::from(io::ErrorKind::OutOfMemory))
        })
    }

    unsafe fn commit(&self, _ptr: NonNull<u8>, _size: usize) -> Result<(), PlatformError> {
        Ok(())
    }

    unsafe fn decommit(&self, _ptr: NonNull<u8>, _size: usize) {}

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Ok(layout) = self.layout(size) {
            // SAFETY: caller guarantees (ptr, size) came from `reserve`, which
            // allocated with exactly this layout.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}
