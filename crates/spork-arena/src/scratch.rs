//! Scratch arenas with conflict avoidance.
//!
//! A [`ScratchPool`] owns a small fixed set of arenas (two by default),
//! created lazily on first use. [`ScratchPool::get`] begins a scope on
//! the first slot that is neither listed as a conflict nor held by
//! another live scope, so a function that receives an arena from its
//! caller can take scratch memory without trampling the caller's data.
//!
//! Each thread also gets an implicit pool, reached through
//! [`with_thread_scratch`]. It is dropped, and its memory released, when
//! the thread exits.

use std::cell::{OnceCell, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use spork_platform::{default_backend, MemoryBackend};

use crate::arena::{Arena, ArenaId};
use crate::config::ScratchConfig;
use crate::error::ArenaError;
use crate::report::report_detached;

/// A fixed set of lazily created scratch arenas.
///
/// `Send` but not `Sync`: a pool belongs to one thread at a time.
pub struct ScratchPool {
    config: ScratchConfig,
    backend: Arc<dyn MemoryBackend>,
    slots: Box<[RefCell<Option<Arena>>]>,
}

impl ScratchPool {
    /// Pool on the default backend.
    pub fn new(config: ScratchConfig) -> Result<Self, ArenaError> {
        Self::with_backend(config, default_backend())
    }

    /// Pool on an explicit backend.
    pub fn with_backend(
        config: ScratchConfig,
        backend: Arc<dyn MemoryBackend>,
    ) -> Result<Self, ArenaError> {
        if let Err(err) = config.validate() {
            let err = ArenaError::from(err);
            report_detached(config.arena.error_callback.as_ref(), &err);
            return Err(err);
        }
        let slots = (0..config.slots).map(|_| RefCell::new(None)).collect();
        Ok(Self {
            config,
            backend,
            slots,
        })
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The pool's configuration.
    pub fn config(&self) -> &ScratchConfig {
        &self.config
    }

    /// Slots whose arena has been created.
    pub fn created(&self) -> usize {
        self.slots
            .iter()
            .filter(|cell| cell.try_borrow().map_or(true, |slot| slot.is_some()))
            .count()
    }

    /// Begin a scope on a scratch arena that is not in `conflicts` and not
    /// held by another scope from this pool.
    ///
    /// Fails with `ScratchUnavailable` when every slot is excluded, or with
    /// `InitFailed` if the chosen slot's arena cannot be created.
    pub fn get(&self, conflicts: &[ArenaId]) -> Result<ScratchScope<'_>, ArenaError> {
        for (index, cell) in self.slots.iter().enumerate() {
            let Ok(mut guard) = cell.try_borrow_mut() else {
                continue;
            };
            if guard
                .as_ref()
                .is_some_and(|arena| conflicts.contains(&arena.id()))
            {
                continue;
            }
            if guard.is_none() {
                let arena =
                    Arena::with_backend(self.config.arena.clone(), Arc::clone(&self.backend))?;
                tracing::debug!(slot = index, id = %arena.id(), "created scratch arena");
                *guard = Some(arena);
            }
            if let Ok(arena) = RefMut::filter_map(guard, Option::as_mut) {
                return Ok(ScratchScope::begin(arena, index));
            }
        }

        let err = ArenaError::ScratchUnavailable {
            conflicts: conflicts.len(),
            slots: self.slots.len(),
        };
        report_detached(self.config.arena.error_callback.as_ref(), &err);
        Err(err)
    }
}

impl fmt::Debug for ScratchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchPool")
            .field("slots", &self.slots.len())
            .field("created", &self.created())
            .field("backend", &self.backend.kind())
            .finish()
    }
}

/// A temp scope on one scratch slot.
///
/// Ending it (explicitly with [`release`](Self::release) or by dropping)
/// rolls the slot back and frees it for the next request. Committed
/// memory stays with the slot.
pub struct ScratchScope<'a> {
    arena: RefMut<'a, Arena>,
    start: u64,
    slot: usize,
}

impl<'a> ScratchScope<'a> {
    fn begin(arena: RefMut<'a, Arena>, slot: usize) -> Self {
        let start = arena.pos();
        Self { arena, start, slot }
    }

    /// Slot index within the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Position the slot will roll back to.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// End the scope now.
    pub fn release(self) {}
}

impl Deref for ScratchScope<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &self.arena
    }
}

impl DerefMut for ScratchScope<'_> {
    fn deref_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }
}

impl Drop for ScratchScope<'_> {
    fn drop(&mut self) {
        self.arena.pop_to(self.start);
    }
}

impl fmt::Debug for ScratchScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchScope")
            .field("slot", &self.slot)
            .field("arena", &self.arena.id())
            .field("start", &self.start)
            .finish()
    }
}

thread_local! {
    static THREAD_CONFIG: RefCell<Option<ScratchConfig>> = const { RefCell::new(None) };
    static THREAD_POOL: OnceCell<ScratchPool> = const { OnceCell::new() };
}

/// Configure the calling thread's scratch pool.
///
/// Only takes effect before the pool is first used; returns `false` if it
/// already exists.
pub fn set_thread_scratch_config(config: ScratchConfig) -> bool {
    if THREAD_POOL.with(|pool| pool.get().is_some()) {
        return false;
    }
    THREAD_CONFIG.with(|slot| *slot.borrow_mut() = Some(config));
    true
}

/// Run `f` with a scratch scope from the calling thread's pool.
///
/// The pool is created on first use. Calls nest: an inner call skips the
/// slot held by the outer one.
pub fn with_thread_scratch<R>(
    conflicts: &[ArenaId],
    f: impl FnOnce(&mut ScratchScope<'_>) -> R,
) -> Result<R, ArenaError> {
    THREAD_POOL.with(|cell| {
        let pool = match cell.get() {
            Some(pool) => pool,
            None => {
                let config = THREAD_CONFIG
                    .with(|slot| slot.borrow().clone())
                    .unwrap_or_default();
                let pool = ScratchPool::new(config)?;
                cell.get_or_init(|| pool)
            }
        };
        let mut scope = pool.get(conflicts)?;
        Ok(f(&mut scope))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArenaConfig;
    use spork_platform::HeapMemory;

    fn pool(slots: usize) -> ScratchPool {
        let config = ScratchConfig::new(slots).with_arena(ArenaConfig::new(64 * 1024, 4096));
        ScratchPool::with_backend(config, Arc::new(HeapMemory::with_page_size(4096))).unwrap()
    }

    #[test]
    fn slots_are_created_lazily() {
        let pool = pool(2);
        assert_eq!(pool.created(), 0);
        let scope = pool.get(&[]).unwrap();
        assert_eq!(scope.slot(), 0);
        drop(scope);
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn conflict_is_skipped() {
        let pool = pool(2);
        let first = pool.get(&[]).unwrap().id();
        let scope = pool.get(&[first]).unwrap();
        assert_ne!(scope.id(), first);
        assert_eq!(scope.slot(), 1);
    }

    #[test]
    fn held_slot_is_skipped() {
        let pool = pool(2);
        let outer = pool.get(&[]).unwrap();
        let inner = pool.get(&[]).unwrap();
        assert_ne!(outer.id(), inner.id());
    }

    #[test]
    fn exhausted_pool_reports_unavailable() {
        let pool = pool(1);
        let held = pool.get(&[]).unwrap();
        let err = pool.get(&[]).unwrap_err();
        assert_eq!(
            err,
            ArenaError::ScratchUnavailable {
                conflicts: 0,
                slots: 1
            }
        );
        drop(held);
    }

    #[test]
    fn release_rolls_back() {
        let pool = pool(1);
        let mut scope = pool.get(&[]).unwrap();
        scope.push(1000).unwrap();
        scope.release();
        let scope = pool.get(&[]).unwrap();
        assert_eq!(scope.pos(), 0);
    }

    #[test]
    fn zero_slots_rejected() {
        let config = ScratchConfig::new(0);
        assert!(ScratchPool::with_backend(config, Arc::new(HeapMemory::new())).is_err());
    }

    #[test]
    fn thread_scratch_nests_without_aliasing() {
        std::thread::spawn(|| {
            let outer_id = with_thread_scratch(&[], |outer| {
                outer.push(64).unwrap();
                let inner_id = with_thread_scratch(&[], |inner| inner.id()).unwrap();
                assert_ne!(inner_id, outer.id());
                outer.id()
            })
            .unwrap();
            // The outer slot was released; with no conflicts it is reused.
            let again = with_thread_scratch(&[], |s| (s.id(), s.pos())).unwrap();
            assert_eq!(again, (outer_id, 0));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn thread_config_only_before_first_use() {
        std::thread::spawn(|| {
            assert!(set_thread_scratch_config(ScratchConfig::new(3)));
            with_thread_scratch(&[], |_| ()).unwrap();
            assert!(!set_thread_scratch_config(ScratchConfig::new(1)));
        })
        .join()
        .unwrap();
    }
}
