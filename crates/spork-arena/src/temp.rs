//! Scoped checkpoints.

use std::ops::{Deref, DerefMut};

use crate::arena::Arena;

/// A saved arena position that is restored when the scope ends.
///
/// The scope mutably borrows its arena, so scopes nest strictly LIFO and
/// the rollback runs on every exit path, including unwinding. Pushes go
/// through the scope via `Deref<Target = Arena>`.
///
/// ```
/// # use spork_arena::{Arena, ArenaConfig};
/// let mut arena = Arena::new(ArenaConfig::new(1 << 20, 0)).unwrap();
/// arena.push(16).unwrap();
/// {
///     let mut scope = arena.temp();
///     scope.push(4096).unwrap();
/// }
/// assert_eq!(arena.pos(), 16);
/// ```
#[derive(Debug)]
pub struct TempScope<'a> {
    arena: &'a mut Arena,
    start: u64,
}

impl<'a> TempScope<'a> {
    /// Snapshot `arena`'s position.
    pub fn begin(arena: &'a mut Arena) -> Self {
        let start = arena.pos();
        Self { arena, start }
    }

    /// Position saved at [`begin`](Self::begin).
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Roll back now. Equivalent to dropping the scope.
    pub fn end(self) {}
}

impl Deref for TempScope<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &*self.arena
    }
}

impl DerefMut for TempScope<'_> {
    fn deref_mut(&mut self) -> &mut Arena {
        &mut *self.arena
    }
}

impl Drop for TempScope<'_> {
    fn drop(&mut self) {
        self.arena.pop_to(self.start);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spork_platform::HeapMemory;

    use crate::{Arena, ArenaConfig};

    fn arena() -> Arena {
        Arena::with_backend(
            ArenaConfig::new(64 * 1024, 4096),
            Arc::new(HeapMemory::with_page_size(4096)),
        )
        .unwrap()
    }

    #[test]
    fn end_restores_start() {
        let mut arena = arena();
        arena.push(24).unwrap();
        let mut scope = arena.temp();
        assert_eq!(scope.start(), 24);
        scope.push(100).unwrap();
        scope.end();
        assert_eq!(arena.pos(), 24);
    }

    #[test]
    fn end_after_inner_reset_does_not_raise_position() {
        let mut arena = arena();
        arena.push(64).unwrap();
        let mut scope = arena.temp();
        scope.reset();
        drop(scope);
        assert_eq!(arena.pos(), 0);
    }

    #[test]
    fn rollback_runs_on_unwind() {
        let mut arena = arena();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scope = arena.temp();
            scope.push(512).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(arena.pos(), 0);
    }
}
