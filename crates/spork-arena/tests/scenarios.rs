//! End-to-end arena scenarios, run once per backend.

use std::sync::Arc;

use spork_arena::{Arena, ArenaConfig, ArenaError, BackendKind, MemoryBackend};
use spork_test_utils::{all_backends, check_pattern, fill_pattern, KIB, MIB};

fn growable(backend: Arc<dyn MemoryBackend>) -> Arena {
    Arena::with_backend(ArenaConfig::growable(64 * MIB, MIB), backend).unwrap()
}

#[test]
fn smoke_push_grow_pop() {
    for backend in all_backends() {
        let kind = backend.kind();
        let mut arena = growable(backend);
        assert_eq!(arena.pos(), 0, "{kind:?}");

        arena.push(KIB).unwrap();
        assert_eq!(arena.pos(), KIB, "{kind:?}");

        arena.push_non_zero(63 * MIB).unwrap();
        assert_eq!(arena.pos(), 63 * MIB + KIB, "{kind:?}");

        // Past the 64 MiB reserve: only possible because the arena grows.
        arena.push(256 * MIB).unwrap();
        assert_eq!(arena.pos(), 319 * MIB + KIB, "{kind:?}");
        assert!(arena.capacity() > 64 * MIB, "{kind:?}");

        arena.push(12 * MIB).unwrap();
        assert_eq!(arena.pos(), 331 * MIB + KIB, "{kind:?}");
        arena.push(12 * MIB).unwrap();
        assert_eq!(arena.pos(), 343 * MIB + KIB, "{kind:?}");

        arena.pop(256 * MIB).unwrap();
        assert_eq!(arena.pos(), 63 * MIB + KIB + 24 * MIB, "{kind:?}");
        assert!(arena.take_error().is_none(), "{kind:?}");
    }
}

#[test]
fn nested_temp_scopes() {
    for backend in all_backends() {
        let mut arena = Arena::with_backend(ArenaConfig::new(MIB, 0), backend).unwrap();
        arena.push(40).unwrap();
        let base = arena.pos();

        let mut t1 = arena.temp();
        t1.push(100).unwrap(); // X
        let after_x = t1.pos();
        {
            let mut t2 = t1.temp();
            assert_eq!(t2.start(), after_x);
            t2.push(200).unwrap(); // Y
            assert!(t2.pos() > after_x);
        }
        assert_eq!(t1.pos(), after_x);
        t1.push(300).unwrap(); // Z
        assert!(t1.pos() > after_x);
        t1.end();

        assert_eq!(arena.pos(), base);
    }
}

#[test]
fn fixed_vm_arena_fills_exactly() {
    let Some(vm) = spork_platform::native() else {
        return;
    };
    let mut arena = Arena::with_backend(ArenaConfig::new(MIB, 64 * KIB), vm).unwrap();
    assert_eq!(arena.backend_kind(), BackendKind::VirtualMemory);
    assert_eq!(arena.reserve_size(), MIB);

    arena.push(MIB).unwrap();
    assert_eq!(arena.pos(), MIB);

    let err = arena.push(1).unwrap_err();
    assert!(matches!(err, ArenaError::OutOfMemory { requested: 1, .. }));
    assert_eq!(arena.pos(), MIB);
    assert_eq!(arena.region_count(), 1);
}

#[test]
fn vm_commits_by_block_and_decommits_on_pop() {
    let Some(vm) = spork_platform::native() else {
        return;
    };
    let mut arena = Arena::with_backend(ArenaConfig::new(4 * MIB, 64 * KIB), vm).unwrap();
    let block = arena.block_size();
    assert_eq!(arena.committed_bytes(), block);

    arena.push(block + 1).unwrap();
    assert_eq!(arena.committed_bytes(), 2 * block);

    arena.push(5 * block).unwrap();
    assert!(arena.committed_bytes() >= 6 * block);

    arena.pop_to(10);
    assert_eq!(arena.committed_bytes(), block);
}

#[test]
fn heap_growth_keeps_earlier_data() {
    for backend in all_backends() {
        let kind = backend.kind();
        let mut arena = Arena::with_backend(ArenaConfig::new(4 * MIB, 0), backend).unwrap();
        let block = arena.block_size();

        let first = arena.push(256).unwrap();
        let first_addr = first.as_ptr() as usize;
        // SAFETY: 256 freshly pushed bytes, not aliased.
        fill_pattern(unsafe { std::slice::from_raw_parts_mut(first.as_ptr(), 256) }, 3);

        arena.push(block * 2).unwrap();
        if kind == BackendKind::HeapChain {
            assert!(arena.region_count() >= 2);
        }

        assert_eq!(first.as_ptr() as usize, first_addr);
        // SAFETY: still below the position, so still live.
        let bytes = unsafe { std::slice::from_raw_parts(first.as_ptr(), 256) };
        assert!(check_pattern(bytes, 3), "{kind:?}");
    }
}

#[test]
fn fresh_and_recycled_pushes_are_zero() {
    for backend in all_backends() {
        let mut arena = Arena::with_backend(ArenaConfig::new(MIB, 0), backend).unwrap();
        let bytes = arena.alloc_bytes(4096).unwrap();
        assert!(bytes.iter().all(|&b| b == 0));
        bytes.fill(0xFF);
        arena.reset();

        let bytes = arena.alloc_bytes(8192).unwrap();
        assert!(bytes.iter().all(|&b| b == 0));
    }
}

#[test]
fn growable_arena_releases_chained_regions_on_pop() {
    for backend in all_backends() {
        let mut arena = Arena::with_backend(ArenaConfig::growable(MIB, 64 * KIB), backend).unwrap();
        arena.push(MIB).unwrap();
        arena.push(2 * MIB).unwrap();
        assert!(arena.region_count() >= 2);
        arena.reset();
        assert_eq!(arena.region_count(), 1);
        assert_eq!(arena.capacity(), MIB);
    }
}
