//! The region allocator.
//!
//! An [`Arena`] hands out memory by bumping a position and frees it only
//! by rolling the position back. Memory comes from a chain of backing
//! regions (see `chain.rs`); with the virtual-memory backend the first
//! region reserves the whole capacity and is committed a block at a time,
//! with the heap backend the chain links a new block whenever the head is
//! full.

use std::error::Error as _;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use spork_platform::{align_up, default_backend, BackendKind, MemoryBackend, PlatformError};

use crate::chain::RegionChain;
use crate::config::{ArenaConfig, Geometry};
use crate::error::ArenaError;
use crate::report::{report_detached, ErrorCallback, ErrorReporter};
use crate::temp::TempScope;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an arena.
///
/// Used to name arenas a scratch request must avoid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    fn next() -> Self {
        Self(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}", self.0)
    }
}

/// A growable bump allocator with LIFO rollback.
///
/// `Arena` is `Send` but not `Sync`: every mutation takes `&mut self`, so
/// one thread uses an arena at a time.
///
/// Errors are returned to the caller and also routed through the
/// configured error callback; the most recent one is kept until
/// [`take_error`](Self::take_error) reads it.
pub struct Arena {
    id: ArenaId,
    chain: RegionChain,
    geometry: Geometry,
    growable: bool,
    reporter: ErrorReporter,
}

impl Arena {
    /// Create an arena on the process-wide default backend.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::with_backend(config, default_backend())
    }

    /// Create an arena on an explicit backend.
    ///
    /// The virtual-memory backend reserves the whole capacity and commits
    /// the first block; the heap backend allocates the first block. Any
    /// failure is reported as [`ErrorCode::InitFailed`](crate::ErrorCode)
    /// through the config's callback before being returned.
    pub fn with_backend(
        config: ArenaConfig,
        backend: Arc<dyn MemoryBackend>,
    ) -> Result<Self, ArenaError> {
        let callback = config.error_callback.clone();
        let fail = |err: ArenaError| {
            report_detached(callback.as_ref(), &err);
            err
        };

        let geometry = config
            .resolve(backend.page_size())
            .map_err(|e| fail(e.into()))?;
        let kind = backend.kind();
        let first = match kind {
            BackendKind::VirtualMemory => geometry.reserve,
            BackendKind::HeapChain => geometry.block.min(geometry.reserve),
        };
        let chain = RegionChain::new(backend, first, geometry.reserve as u64, geometry.block)
            .map_err(|e| {
                fail(ArenaError::InitFailed {
                    reason: describe(&e),
                })
            })?;

        let id = ArenaId::next();
        tracing::debug!(
            %id,
            ?kind,
            reserve = geometry.reserve,
            block = geometry.block,
            alignment = geometry.alignment,
            growable = config.growable,
            "created arena"
        );
        Ok(Self {
            id,
            chain,
            geometry,
            growable: config.growable,
            reporter: ErrorReporter::new(config.error_callback),
        })
    }

    /// Create an arena or terminate the process.
    ///
    /// For callers that have no way to continue without their arena. The
    /// failure has already gone through the error callback when this
    /// aborts.
    pub fn new_or_abort(config: ArenaConfig) -> Self {
        match Self::new(config) {
            Ok(arena) => arena,
            Err(err) => {
                tracing::error!(error = %err, "arena initialisation failed, aborting");
                eprintln!("spork: {err}");
                std::process::abort()
            }
        }
    }

    // ── Pushing ─────────────────────────────────────────────────

    /// Push `size` zeroed bytes and return a pointer to them.
    ///
    /// The pointer is aligned to [`alignment`](Self::alignment) and stays
    /// valid until the position is rolled back below it or the arena is
    /// dropped.
    pub fn push(&mut self, size: u64) -> Result<NonNull<u8>, ArenaError> {
        self.push_raw(size, self.geometry.alignment, true)
    }

    /// Push `size` bytes without clearing them.
    ///
    /// Memory the arena has never handed out before is zero anyway; bytes
    /// recycled after a pop keep their old contents.
    pub fn push_non_zero(&mut self, size: u64) -> Result<NonNull<u8>, ArenaError> {
        self.push_raw(size, self.geometry.alignment, false)
    }

    /// Push room for `count` zeroed values of `T`, aligned for `T`.
    pub fn push_array<T>(&mut self, count: usize) -> Result<NonNull<T>, ArenaError> {
        self.push_typed::<T>(count, true)
    }

    /// Push room for `count` values of `T` without clearing it.
    pub fn push_array_non_zero<T>(&mut self, count: usize) -> Result<NonNull<T>, ArenaError> {
        self.push_typed::<T>(count, false)
    }

    /// Push `len` zeroed bytes as a slice.
    pub fn alloc_bytes(&mut self, len: usize) -> Result<&mut [u8], ArenaError> {
        match self.place(len as u64, self.geometry.alignment)? {
            Some((offset, end)) => Ok(self.chain.claim_bytes(offset, end, true)),
            None => Ok(&mut []),
        }
    }

    /// Push `len` bytes as a slice without clearing recycled memory.
    pub fn alloc_bytes_non_zero(&mut self, len: usize) -> Result<&mut [u8], ArenaError> {
        match self.place(len as u64, self.geometry.alignment)? {
            Some((offset, end)) => Ok(self.chain.claim_bytes(offset, end, false)),
            None => Ok(&mut []),
        }
    }

    /// Copy `src` into the arena.
    pub fn alloc_slice_copy<T: Copy>(&mut self, src: &[T]) -> Result<&mut [T], ArenaError> {
        let size = std::mem::size_of_val(src) as u64;
        let align = self.geometry.alignment.max(std::mem::align_of::<T>());
        match self.place(size, align)? {
            Some((offset, end)) => Ok(self.chain.claim_copy(offset, end, src)),
            None => Ok(&mut []),
        }
    }

    fn push_typed<T>(&mut self, count: usize, zero: bool) -> Result<NonNull<T>, ArenaError> {
        let align = self.geometry.alignment.max(std::mem::align_of::<T>());
        let Some(size) = count.checked_mul(std::mem::size_of::<T>()) else {
            let err = self.out_of_memory(u64::MAX);
            return Err(self.reporter.report(err));
        };
        self.push_raw(size as u64, align, zero).map(NonNull::cast)
    }

    fn push_raw(&mut self, size: u64, align: usize, zero: bool) -> Result<NonNull<u8>, ArenaError> {
        match self.place(size, align)? {
            Some((offset, end)) => Ok(self.chain.claim(offset, end, zero)),
            None => Ok(dangling(align)),
        }
    }

    /// Make the head region able to hold `size` bytes at `align`, growing
    /// or committing as needed. Returns head-local `[offset, end)`.
    ///
    /// `None` is only returned for a zero-byte request that does not fit;
    /// such a push succeeds without touching the position.
    fn place(&mut self, size: u64, align: usize) -> Result<Option<(usize, usize)>, ArenaError> {
        let Ok(len) = usize::try_from(size) else {
            let err = self.out_of_memory(size);
            return Err(self.reporter.report(err));
        };
        if let Some(range) = self.chain.fit(len, align) {
            self.commit_head(range.1, size)?;
            return Ok(Some(range));
        }
        if len == 0 {
            return Ok(None);
        }

        self.grow(len, align)?;
        match self.chain.fit(len, align) {
            Some(range) => {
                self.commit_head(range.1, size)?;
                Ok(Some(range))
            }
            None => {
                let err = self.out_of_memory(size);
                Err(self.reporter.report(err))
            }
        }
    }

    fn commit_head(&mut self, end: usize, requested: u64) -> Result<(), ArenaError> {
        self.chain.ensure_committed(end).map_err(|e| {
            self.reporter.report(ArenaError::CommitFailed {
                requested,
                reason: describe(&e),
            })
        })
    }

    /// Link a region that can hold `len` bytes at `align`.
    ///
    /// Within the capacity only the heap backend needs a new region (the
    /// virtual-memory head already spans the capacity). Past the capacity
    /// a growable arena extends it by `max(reserve, round_up(len, block))`;
    /// a fixed arena fails with `OutOfMemory`.
    fn grow(&mut self, len: usize, align: usize) -> Result<(), ArenaError> {
        let position = self.chain.position();
        let ceiling = self.chain.ceiling();
        let block = self.geometry.block;
        let padding = if align > self.geometry.page_size { align } else { 0 };

        let Some((needed, rounded)) = len
            .checked_add(padding)
            .and_then(|n| align_up(n, block).map(|r| (n, r)))
        else {
            let err = self.out_of_memory(len as u64);
            return Err(self.reporter.report(err));
        };

        let heap = self.chain.kind() == BackendKind::HeapChain;
        let within = heap && position.saturating_add(needed as u64) <= ceiling;
        let new_ceiling = if within {
            ceiling
        } else if self.growable {
            match position.checked_add((self.geometry.reserve as u64).max(rounded as u64)) {
                Some(c) => c,
                None => {
                    let err = self.out_of_memory(len as u64);
                    return Err(self.reporter.report(err));
                }
            }
        } else {
            let err = self.out_of_memory(len as u64);
            return Err(self.reporter.report(err));
        };

        let span = new_ceiling - position;
        let region_size = if heap { span.min(rounded as u64) } else { span } as usize;
        self.chain
            .push_region(region_size, new_ceiling, needed)
            .map_err(|e| {
                let requested = region_size as u64;
                let reason = describe(&e);
                self.reporter.report(if heap {
                    ArenaError::MallocFailed { requested, reason }
                } else {
                    ArenaError::CommitFailed { requested, reason }
                })
            })
    }

    fn out_of_memory(&self, requested: u64) -> ArenaError {
        ArenaError::OutOfMemory {
            requested,
            position: self.pos(),
            capacity: self.capacity(),
        }
    }

    // ── Popping ─────────────────────────────────────────────────

    /// Roll the position back by `size` bytes.
    ///
    /// Asking for more than [`pos`](Self::pos) clamps to 0 and reports
    /// `CannotPopMore`.
    pub fn pop(&mut self, size: u64) -> Result<(), ArenaError> {
        let position = self.pos();
        if size > position {
            self.chain.rewind(0);
            return Err(self.reporter.report(ArenaError::CannotPopMore {
                requested: size,
                available: position,
            }));
        }
        self.chain.rewind(position - size);
        Ok(())
    }

    /// Roll the position back to `position`. A target at or above the
    /// current position is a no-op.
    pub fn pop_to(&mut self, position: u64) {
        if position < self.pos() {
            self.chain.rewind(position);
        }
    }

    /// Roll back to position 0, keeping only the first region.
    pub fn reset(&mut self) {
        self.pop_to(0);
    }

    /// Open a scope that rolls back to the current position when it ends.
    pub fn temp(&mut self) -> TempScope<'_> {
        TempScope::begin(self)
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Current write position in bytes.
    pub fn pos(&self) -> u64 {
        self.chain.position()
    }

    /// Logical capacity in bytes. Grows when a growable arena links a
    /// region past its reserve.
    pub fn capacity(&self) -> u64 {
        self.chain.ceiling()
    }

    /// Reserve size after rounding.
    pub fn reserve_size(&self) -> u64 {
        self.geometry.reserve as u64
    }

    /// Block size after rounding.
    pub fn block_size(&self) -> u64 {
        self.geometry.block as u64
    }

    /// Alignment of every push.
    pub fn alignment(&self) -> usize {
        self.geometry.alignment
    }

    /// Whether the arena may grow past its reserve.
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Backend family in use.
    pub fn backend_kind(&self) -> BackendKind {
        self.chain.kind()
    }

    /// The backend in use.
    pub fn backend(&self) -> &Arc<dyn MemoryBackend> {
        self.chain.backend()
    }

    /// Accessible bytes across all regions.
    pub fn committed_bytes(&self) -> u64 {
        self.chain.committed_bytes()
    }

    /// Number of backing regions currently linked.
    pub fn region_count(&self) -> usize {
        self.chain.len()
    }

    /// This arena's identity.
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// The configured error callback.
    pub fn error_callback(&self) -> Option<&ErrorCallback> {
        self.reporter.callback()
    }

    /// Take the most recent error, clearing it.
    pub fn take_error(&mut self) -> Option<ArenaError> {
        self.reporter.take_last()
    }

    /// Look at the most recent error without clearing it.
    pub fn last_error(&self) -> Option<&ArenaError> {
        self.reporter.peek_last()
    }

    /// The last `len` bytes pushed, viewed again as a slice.
    pub(crate) fn tail_bytes(&mut self, len: usize) -> &mut [u8] {
        self.chain.tail_bytes(len)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("pos", &self.pos())
            .field("capacity", &self.capacity())
            .field("chain", &self.chain)
            .field("growable", &self.growable)
            .finish()
    }
}

/// Backend error text including its OS cause.
fn describe(err: &PlatformError) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

fn dangling(align: usize) -> NonNull<u8> {
    NonNull::new(std::ptr::without_provenance_mut(align)).unwrap_or(NonNull::dangling())
}
