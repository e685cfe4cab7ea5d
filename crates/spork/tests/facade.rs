//! The facade's prelude is enough to drive every layer.

use spork::prelude::*;

#[test]
fn prelude_covers_arena_scratch_and_workers() {
    let mut arena = Arena::new(ArenaConfig::growable(1 << 20, 1 << 16)).unwrap();
    let kept = arena.join(&["a", "b"], "<", "|", ">").unwrap().to_owned();
    assert_eq!(kept, "<a|b>");

    let pool = ScratchPool::new(ScratchConfig::default()).unwrap();
    let scratch = pool.get(&[arena.id()]).unwrap();
    assert_ne!(scratch.id(), arena.id());
    drop(scratch);

    let mut workers = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
    workers
        .submit(|ctx: &mut WorkerContext| {
            ctx.arena().push(1024).unwrap();
        })
        .unwrap();
    assert_eq!(workers.wait().completed, 1);
}

#[test]
fn errors_carry_stable_codes() {
    let mut arena = Arena::new(ArenaConfig::new(1 << 16, 0)).unwrap();
    let err = arena.pop(1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CannotPopMore);
    assert!(matches!(
        arena.backend_kind(),
        BackendKind::VirtualMemory | BackendKind::HeapChain
    ));
}
