//! Criterion micro-benchmarks for push/pop, temp scopes, scratch and strings.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spork_arena::{ScratchConfig, ScratchPool};
use spork_bench::{arena_on, labelled_backends, push_sizes, reference_profile, small_block_profile};

/// Benchmark: 1000 fixed 64-byte pushes, then reset.
fn bench_push_small(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_64b_x1000");
    for (label, backend) in labelled_backends() {
        let mut arena = arena_on(reference_profile(), &backend).unwrap();
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(arena.push_non_zero(64).unwrap());
                }
                arena.reset();
            });
        });
    }
    group.finish();
}

/// Benchmark: 1000 varied pushes (1..=4096 bytes) on 64 KiB blocks, so the
/// run crosses many block boundaries.
fn bench_push_varied(c: &mut Criterion) {
    let sizes = push_sizes(1000, 4096, 42);
    let mut group = c.benchmark_group("push_varied_x1000");
    for (label, backend) in labelled_backends() {
        let mut arena = arena_on(small_block_profile(), &backend).unwrap();
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                for &size in &sizes {
                    black_box(arena.push(size).unwrap());
                }
                arena.reset();
            });
        });
    }
    group.finish();
}

/// Baseline for the varied workload: the same sizes through the global
/// allocator.
fn bench_boxed_baseline(c: &mut Criterion) {
    let sizes = push_sizes(1000, 4096, 42);
    c.bench_function("boxed_varied_x1000", |b| {
        b.iter(|| {
            let boxes: Vec<Box<[u8]>> = sizes
                .iter()
                .map(|&size| vec![0u8; size as usize].into_boxed_slice())
                .collect();
            black_box(boxes);
        });
    });
}

/// Benchmark: open a temp scope, push 16 KiB, close it.
fn bench_temp_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("temp_scope_16k");
    for (label, backend) in labelled_backends() {
        let mut arena = arena_on(reference_profile(), &backend).unwrap();
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                let mut scope = arena.temp();
                black_box(scope.push(16 * 1024).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark: scratch get with one conflict, push, release.
fn bench_scratch_get(c: &mut Criterion) {
    let pool = ScratchPool::new(ScratchConfig::default()).unwrap();
    let outer = pool.get(&[]).unwrap();
    let conflict = outer.id();
    c.bench_function("scratch_get_release", |b| {
        b.iter(|| {
            let mut scratch = pool.get(&[conflict]).unwrap();
            black_box(scratch.push(256).unwrap());
        });
    });
    drop(outer);
}

/// Benchmark: formatted string push.
fn bench_push_fmt(c: &mut Criterion) {
    let mut arena = arena_on(reference_profile(), &labelled_backends()[0].1).unwrap();
    c.bench_function("push_fmt", |b| {
        b.iter(|| {
            let mut scope = arena.temp();
            let s = scope
                .push_fmt(format_args!("{}:{:08x}:{}", "region", 0xdead_beef_u32, 1.5f32))
                .unwrap();
            black_box(s.len());
        });
    });
}

criterion_group!(
    benches,
    bench_push_small,
    bench_push_varied,
    bench_boxed_baseline,
    bench_temp_scope,
    bench_scratch_get,
    bench_push_fmt
);
criterion_main!(benches);
