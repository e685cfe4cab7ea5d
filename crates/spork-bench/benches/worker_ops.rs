//! Criterion benchmarks for the worker pool.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use spork_worker::{WorkerPool, WorkerPoolConfig};

/// Benchmark: submit 256 small arena tasks to 4 workers and wait.
fn bench_submit_wait(c: &mut Criterion) {
    let mut pool = WorkerPool::new(WorkerPoolConfig::new(4).with_max_tasks(256)).unwrap();
    c.bench_function("worker_submit_wait_256", |b| {
        b.iter(|| {
            for i in 0..256u64 {
                pool.submit(move |ctx| {
                    let mut scope = ctx.arena().temp();
                    let buf = scope.alloc_bytes_non_zero(512).unwrap();
                    buf[0] = i as u8;
                    black_box(buf[0]);
                })
                .unwrap();
            }
            black_box(pool.wait());
        });
    });
}

criterion_group!(benches, bench_submit_wait);
criterion_main!(benches);
