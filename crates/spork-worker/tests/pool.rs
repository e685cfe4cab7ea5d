//! Worker pool integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use spork_arena::{ArenaConfig, ErrorCode, ScratchConfig};
use spork_test_utils::{check_pattern, fill_pattern, RecordingCallback, KIB, MIB};
use spork_worker::{WorkerError, WorkerPool, WorkerPoolConfig};

#[test]
fn worker_arena_persists_between_tasks() {
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
    let positions = Arc::new(Mutex::new(Vec::new()));

    let p = Arc::clone(&positions);
    pool.submit(move |ctx| {
        let bytes = ctx.arena().alloc_bytes(4096).unwrap();
        fill_pattern(bytes, 7);
        p.lock().unwrap().push(ctx.arena().pos());
    })
    .unwrap();
    let p = Arc::clone(&positions);
    pool.submit(move |ctx| {
        p.lock().unwrap().push(ctx.arena().pos());
    })
    .unwrap();

    assert_eq!(pool.wait().completed, 2);
    let positions = positions.lock().unwrap();
    assert!(positions[0] >= 4096);
    assert_eq!(positions[0], positions[1]);
}

#[test]
fn panicking_task_rolls_back_its_pushes() {
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
    let seen = Arc::new(Mutex::new((0u64, 0u64)));

    let s = Arc::clone(&seen);
    pool.submit(move |ctx| {
        ctx.arena().push(100).unwrap();
        s.lock().unwrap().0 = ctx.arena().pos();
    })
    .unwrap();
    pool.submit(|ctx| {
        ctx.arena().push(64 * KIB).unwrap();
        panic!("mid-task failure");
    })
    .unwrap();
    let s = Arc::clone(&seen);
    pool.submit(move |ctx| {
        s.lock().unwrap().1 = ctx.arena().pos();
    })
    .unwrap();

    let summary = pool.wait();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.panicked, 1);
    let (before, after) = *seen.lock().unwrap();
    assert_eq!(before, after);
}

#[test]
fn worker_indices_cover_the_pool() {
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(3)).unwrap();
    assert_eq!(pool.worker_count(), 3);
    let max_index = Arc::new(AtomicUsize::new(0));
    for _ in 0..30 {
        let m = Arc::clone(&max_index);
        pool.submit(move |ctx| {
            m.fetch_max(ctx.index(), Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.wait();
    assert!(max_index.load(Ordering::SeqCst) < 3);
}

#[test]
fn tasks_use_scratch_alongside_the_arena() {
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));
    for i in 0..16u8 {
        let r = Arc::clone(&results);
        pool.submit(move |ctx| {
            let (arena, scratch) = ctx.split();
            let mut tmp = scratch.get(&[arena.id()]).unwrap();
            let buf = tmp.alloc_bytes(1024).unwrap();
            fill_pattern(buf, i);
            assert!(check_pattern(buf, i));
            let label = tmp.push_fmt(format_args!("item-{i}")).unwrap().to_owned();
            drop(tmp);
            let kept = arena.push_str(&label).unwrap();
            r.lock().unwrap().push(kept.to_owned());
        })
        .unwrap();
    }
    assert_eq!(pool.wait().completed, 16);
    let mut results = results.lock().unwrap().clone();
    results.sort();
    assert_eq!(results.len(), 16);
    assert!(results.contains(&"item-0".to_string()));
    assert!(results.contains(&"item-15".to_string()));
}

#[test]
fn arena_errors_reach_the_configured_callback() {
    let recorder = RecordingCallback::new();
    let arena = ArenaConfig::new(64 * KIB, 0).with_error_callback(recorder.callback());
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(1).with_arena(arena)).unwrap();
    pool.submit(|ctx| {
        assert!(ctx.arena().push(MIB).is_err());
    })
    .unwrap();
    assert_eq!(pool.wait().completed, 1);
    assert_eq!(recorder.codes(), vec![ErrorCode::OutOfMemory]);
}

#[test]
fn invalid_scratch_config_is_rejected() {
    let config = WorkerPoolConfig::new(2).with_scratch(ScratchConfig::new(0));
    assert!(matches!(
        WorkerPool::new(config),
        Err(WorkerError::InvalidConfig { .. })
    ));
}

#[test]
fn shutdown_drains_outstanding_tasks() {
    let pool = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
    for _ in 0..10 {
        pool.submit(|ctx| {
            ctx.arena().push(128).unwrap();
        })
        .unwrap();
    }
    let summary = pool.shutdown();
    assert_eq!(summary.total(), 10);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn summary_counts_every_task(plan in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut pool = WorkerPool::new(WorkerPoolConfig::new(2).with_max_tasks(64)).unwrap();
        for &fail in &plan {
            pool.submit(move |ctx| {
                ctx.arena().push(32).unwrap();
                if fail {
                    panic!("planned");
                }
            })
            .unwrap();
        }
        let summary = pool.wait();
        let failures = plan.iter().filter(|&&f| f).count();
        prop_assert_eq!(summary.panicked, failures);
        prop_assert_eq!(summary.completed, plan.len() - failures);
    }
}
