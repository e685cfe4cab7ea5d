//! Backing regions and the LIFO chain that links them.
//!
//! A [`Region`] is one reservation (virtual memory) or one block (heap).
//! The [`RegionChain`] owns them in a `Vec` whose last element is the
//! head; only the head receives pushes, earlier regions never move. Each
//! region records the global position at which it starts, so the chain's
//! position is `head.start + head.used`.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use spork_platform::{align_up, BackendKind, MemoryBackend, PlatformError};

use crate::raw;

/// One contiguous backing range.
#[derive(Debug)]
pub(crate) struct Region {
    base: NonNull<u8>,
    /// Bytes obtained from the backend's `reserve`.
    reserved: usize,
    /// Bytes accessible from `base`. Equals `reserved` for heap blocks.
    committed: usize,
    /// Local write position.
    used: usize,
    /// Bytes from `base` that may hold non-zero data.
    dirty: usize,
    /// Global position of `base`.
    start: u64,
    /// Arena capacity while this region is the head.
    ceiling: u64,
}

impl Region {
    /// Aligned `[offset, end)` for a push of `size` bytes, or `None` if it
    /// would run past the reservation or the ceiling.
    fn fit(&self, size: usize, align: usize) -> Option<(usize, usize)> {
        let addr = self.base.as_ptr() as usize;
        let aligned = align_up(addr.checked_add(self.used)?, align)?;
        let offset = aligned - addr;
        let end = offset.checked_add(size)?;
        if end > self.reserved || self.start + end as u64 > self.ceiling {
            return None;
        }
        Some((offset, end))
    }
}

/// The arena's backing store.
pub(crate) struct RegionChain {
    backend: Arc<dyn MemoryBackend>,
    regions: Vec<Region>,
    block_size: usize,
}

// SAFETY: the chain exclusively owns every region it points at; the raw
// pointers are never shared with another chain. Access goes through
// `&mut self`, so moving the chain to another thread is sound. It is not
// `Sync`.
unsafe impl Send for RegionChain {}

impl RegionChain {
    /// Chain with a first region of `first_size` bytes at position 0.
    pub(crate) fn new(
        backend: Arc<dyn MemoryBackend>,
        first_size: usize,
        ceiling: u64,
        block_size: usize,
    ) -> Result<Self, PlatformError> {
        let mut chain = Self {
            backend,
            regions: Vec::new(),
            block_size,
        };
        chain.link(first_size, 0, ceiling, block_size)?;
        Ok(chain)
    }

    /// Reserve `size` bytes (rounded to a page multiple) as the new head,
    /// starting at the current position, and commit enough for
    /// `first_commit` bytes.
    pub(crate) fn push_region(
        &mut self,
        size: usize,
        ceiling: u64,
        first_commit: usize,
    ) -> Result<(), PlatformError> {
        self.link(size, self.position(), ceiling, first_commit)
    }

    fn link(
        &mut self,
        size: usize,
        start: u64,
        ceiling: u64,
        first_commit: usize,
    ) -> Result<(), PlatformError> {
        let page = self.backend.page_size();
        let reserved = align_up(size.max(1), page).ok_or(PlatformError::InvalidLayout {
            size,
            align: page,
        })?;
        let base = self.backend.reserve(reserved)?;

        let committed = match self.backend.kind() {
            BackendKind::HeapChain => reserved,
            BackendKind::VirtualMemory => {
                let want = align_up(first_commit.max(1), self.block_size)
                    .unwrap_or(reserved)
                    .min(reserved);
                // SAFETY: `base..base + want` lies inside the reservation just
                // obtained from this backend.
                if let Err(err) = unsafe { self.backend.commit(base, want) } {
                    // SAFETY: exactly the reservation made above, never used.
                    unsafe { self.backend.release(base, reserved) };
                    return Err(err);
                }
                want
            }
        };

        tracing::debug!(
            kind = ?self.backend.kind(),
            reserved,
            committed,
            start,
            ceiling,
            regions = self.regions.len() + 1,
            "linked arena region"
        );
        self.regions.push(Region {
            base,
            reserved,
            committed,
            used: 0,
            dirty: 0,
            start,
            ceiling,
        });
        Ok(())
    }

    fn head(&self) -> &Region {
        // The first region is linked in `new` and never unlinked.
        &self.regions[self.regions.len() - 1]
    }

    fn head_mut(&mut self) -> &mut Region {
        let last = self.regions.len() - 1;
        &mut self.regions[last]
    }

    pub(crate) fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn MemoryBackend> {
        &self.backend
    }

    /// Global write position.
    pub(crate) fn position(&self) -> u64 {
        let head = self.head();
        head.start + head.used as u64
    }

    /// Capacity in effect for the head region.
    pub(crate) fn ceiling(&self) -> u64 {
        self.head().ceiling
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }

    /// Accessible bytes across all regions.
    pub(crate) fn committed_bytes(&self) -> u64 {
        self.regions.iter().map(|r| r.committed as u64).sum()
    }

    /// Head-local `[offset, end)` for a push, if it fits the head.
    pub(crate) fn fit(&self, size: usize, align: usize) -> Option<(usize, usize)> {
        self.head().fit(size, align)
    }

    /// Make the head accessible up to `end`, committing whole blocks.
    pub(crate) fn ensure_committed(&mut self, end: usize) -> Result<(), PlatformError> {
        let block = self.block_size;
        let backend = Arc::clone(&self.backend);
        let head = self.head_mut();
        if end <= head.committed {
            return Ok(());
        }
        let target = align_up(end, block)
            .unwrap_or(head.reserved)
            .min(head.reserved);
        // SAFETY: `head.committed` and `target` are page-aligned offsets
        // inside the head's reservation.
        unsafe {
            let from = NonNull::new_unchecked(head.base.as_ptr().add(head.committed));
            backend.commit(from, target - head.committed)?;
        }
        tracing::trace!(from = head.committed, to = target, "committed arena pages");
        head.committed = target;
        Ok(())
    }

    /// Hand out head-local `[offset, end)` and advance the position to
    /// `end`. Zeroes whatever part of the range was previously dirtied
    /// when `zero` is set.
    pub(crate) fn claim(&mut self, offset: usize, end: usize, zero: bool) -> NonNull<u8> {
        let head = self.head_mut();
        debug_assert!(end <= head.committed);
        // SAFETY: `offset <= end <= reserved`, within the allocation.
        let ptr = unsafe { NonNull::new_unchecked(head.base.as_ptr().add(offset)) };
        if zero && offset < head.dirty {
            let dirty_end = end.min(head.dirty);
            // SAFETY: committed, owned by the arena, no outstanding borrow
            // of bytes above the old position.
            unsafe { raw::zero(ptr, dirty_end - offset) };
        }
        head.dirty = head.dirty.max(end);
        head.used = end;
        ptr
    }

    /// [`claim`](Self::claim) viewed as a byte slice borrowing the chain.
    pub(crate) fn claim_bytes(&mut self, offset: usize, end: usize, zero: bool) -> &mut [u8] {
        let ptr = self.claim(offset, end, zero);
        // SAFETY: the range is committed and initialised (zero pages or
        // earlier writes), and the `&mut self` borrow keeps every other
        // access to the chain out for the slice's lifetime.
        unsafe { raw::bytes_mut(ptr, end - offset) }
    }

    /// Claim `[offset, end)` and fill it with a copy of `src`.
    ///
    /// `offset` must be aligned for `T` and `end - offset` must equal
    /// `size_of_val(src)`.
    pub(crate) fn claim_copy<T: Copy>(&mut self, offset: usize, end: usize, src: &[T]) -> &mut [T] {
        debug_assert_eq!(end - offset, std::mem::size_of_val(src));
        let ptr = self.claim(offset, end, false).cast::<T>();
        debug_assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<T>(), 0);
        // SAFETY: the destination holds `src.len()` aligned `T` slots that
        // cannot overlap `src` (it was unreachable before this claim); after
        // the copy every slot is a valid `T`.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            raw::slice_mut(ptr, src.len())
        }
    }

    /// The last `len` bytes below the head's position.
    pub(crate) fn tail_bytes(&mut self, len: usize) -> &mut [u8] {
        let head = self.head_mut();
        let len = len.min(head.used);
        // SAFETY: `used - len..used` was claimed from the head and is
        // committed; `&mut self` keeps every other view out.
        unsafe {
            let from = NonNull::new_unchecked(head.base.as_ptr().add(head.used - len));
            raw::bytes_mut(from, len)
        }
    }

    /// Roll the position back to `target`, releasing every region that
    /// starts at or above it (such a region holds nothing below `target`,
    /// and the region beneath it ends exactly where it starts). The first
    /// region is never released. Returns the number of regions released.
    pub(crate) fn rewind(&mut self, target: u64) -> usize {
        let mut released = 0;
        while self.regions.len() > 1 && target <= self.head().start {
            if let Some(region) = self.regions.pop() {
                self.release_region(&region);
                released += 1;
            }
        }

        let block = self.block_size;
        let backend = Arc::clone(&self.backend);
        let head = self.head_mut();
        head.used = (target - head.start) as usize;

        if backend.kind() == BackendKind::VirtualMemory {
            let keep = align_up(head.used, block)
                .unwrap_or(head.reserved)
                .max(block)
                .min(head.reserved);
            if head.committed > keep {
                // SAFETY: `keep..committed` is a page-aligned committed range
                // of the head, above the new position, with no live borrows.
                unsafe {
                    let from = NonNull::new_unchecked(head.base.as_ptr().add(keep));
                    backend.decommit(from, head.committed - keep);
                }
                tracing::debug!(
                    released_bytes = head.committed - keep,
                    "decommitted arena pages"
                );
                head.committed = keep;
            }
            head.dirty = head.dirty.min(keep);
        }
        if released > 0 {
            tracing::debug!(released, remaining = self.regions.len(), "released arena regions");
        }
        released
    }

    fn release_region(&self, region: &Region) {
        // SAFETY: (base, reserved) is exactly what `reserve` returned; the
        // region has been unlinked, so nothing can reach its memory.
        unsafe { self.backend.release(region.base, region.reserved) };
    }
}

impl Drop for RegionChain {
    fn drop(&mut self) {
        while let Some(region) = self.regions.pop() {
            self.release_region(&region);
        }
    }
}

impl fmt::Debug for RegionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionChain")
            .field("kind", &self.backend.kind())
            .field("regions", &self.regions.len())
            .field("position", &self.position())
            .field("block_size", &self.block_size)
            .finish()
    }
}
