//! Scratch conflict avoidance.

use std::sync::Arc;

use spork_arena::{
    with_thread_scratch, Arena, ArenaConfig, ArenaError, ScratchConfig, ScratchPool,
};
use spork_platform::HeapMemory;
use spork_test_utils::{all_backends, KIB};

fn small_pool(backend: Arc<dyn spork_arena::MemoryBackend>, slots: usize) -> ScratchPool {
    let config = ScratchConfig::new(slots).with_arena(ArenaConfig::new(256 * KIB, 0));
    ScratchPool::with_backend(config, backend).unwrap()
}

#[test]
fn conflicting_arena_is_never_returned() {
    for backend in all_backends() {
        let pool = small_pool(backend, 2);
        let a = pool.get(&[]).unwrap().id();
        for _ in 0..10 {
            let scope = pool.get(&[a]).unwrap();
            assert_ne!(scope.id(), a);
        }
    }
}

#[test]
fn second_slot_when_first_is_held() {
    for backend in all_backends() {
        let pool = small_pool(backend, 2);
        let mut held = pool.get(&[]).unwrap();
        held.push(128).unwrap();
        let other = pool.get(&[]).unwrap();
        assert_ne!(other.id(), held.id());
        assert_eq!(other.pos(), 0);
    }
}

#[test]
fn both_conflicted_is_unavailable() {
    let pool = small_pool(Arc::new(HeapMemory::new()), 2);
    let a = pool.get(&[]).unwrap().id();
    let b = pool.get(&[a]).unwrap().id();
    assert!(matches!(
        pool.get(&[a, b]),
        Err(ArenaError::ScratchUnavailable {
            conflicts: 2,
            slots: 2
        })
    ));
}

#[test]
fn scratch_avoids_caller_arena_and_keeps_its_data() {
    // A function building into the caller's arena while using scratch
    // memory must not clobber what the caller pushed.
    fn build(out: &mut Arena, pool: &ScratchPool) -> u64 {
        let mut scratch = pool.get(&[out.id()]).unwrap();
        let tmp = scratch.alloc_slice_copy(&[1u64, 2, 3, 4]).unwrap();
        let sum: u64 = tmp.iter().sum();
        out.alloc_slice_copy(&[sum]).unwrap()[0]
    }

    let pool = small_pool(Arc::new(HeapMemory::new()), 2);
    // Borrow a slot arena as the "caller" arena by holding its scope.
    let mut caller = pool.get(&[]).unwrap();
    let before = caller.pos();
    assert_eq!(build(&mut caller, &pool), 10);
    assert!(caller.pos() > before);
}

#[test]
fn thread_scratch_is_per_thread() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                with_thread_scratch(&[], |scratch| {
                    let s = scratch.push_fmt(format_args!("thread-{i}")).unwrap();
                    s.to_owned()
                })
                .unwrap()
            })
        })
        .collect();
    let mut names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    names.sort();
    assert_eq!(names, ["thread-0", "thread-1", "thread-2", "thread-3"]);
}

#[test]
fn released_slot_keeps_committed_memory() {
    let Some(vm) = spork_platform::native() else {
        return;
    };
    let config = ScratchConfig::new(2).with_arena(ArenaConfig::new(4 * 1024 * KIB, 64 * KIB));
    let pool = ScratchPool::with_backend(config, vm).unwrap();

    let (first_id, block) = {
        let mut scratch = pool.get(&[]).unwrap();
        scratch.push_non_zero(3 * 64 * KIB).unwrap();
        assert!(scratch.committed_bytes() >= 3 * 64 * KIB);
        (scratch.id(), scratch.block_size())
    };

    let again = pool.get(&[]).unwrap();
    assert_eq!(again.id(), first_id);
    assert_eq!(again.pos(), 0);
    assert!(again.committed_bytes() >= block);
    assert_eq!(pool.created(), 1);
}
