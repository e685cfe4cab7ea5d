//! Benchmark profiles and workload helpers for spork.
//!
//! - [`reference_profile`]: 64 MiB reserve, 1 MiB blocks, growable
//! - [`small_block_profile`]: 64 KiB blocks, so growth happens often
//! - [`push_sizes`]: deterministic push-size sequence from a seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use spork_arena::{Arena, ArenaConfig, ArenaError};
use spork_platform::{HeapMemory, MemoryBackend};

const MIB: u64 = 1024 * 1024;

/// The general-purpose arena profile.
pub fn reference_profile() -> ArenaConfig {
    ArenaConfig::growable(64 * MIB, MIB)
}

/// A profile with 64 KiB blocks: heap arenas chain a new region every
/// 64 KiB and virtual-memory arenas commit in 64 KiB steps.
pub fn small_block_profile() -> ArenaConfig {
    ArenaConfig::growable(64 * MIB, 64 * 1024)
}

/// Each backend available here, labelled for benchmark ids.
pub fn labelled_backends() -> Vec<(&'static str, Arc<dyn MemoryBackend>)> {
    let mut backends: Vec<(&'static str, Arc<dyn MemoryBackend>)> =
        vec![("heap", Arc::new(HeapMemory::new()))];
    if let Some(vm) = spork_platform::native() {
        backends.push(("vm", vm));
    }
    backends
}

/// Build an arena for `config` on `backend`.
pub fn arena_on(
    config: ArenaConfig,
    backend: &Arc<dyn MemoryBackend>,
) -> Result<Arena, ArenaError> {
    Arena::with_backend(config, Arc::clone(backend))
}

/// `n` push sizes in `1..=max`, derived from `seed`.
///
/// Uses a fixed LCG step so every run benchmarks the same sequence.
pub fn push_sizes(n: usize, max: u64, seed: u64) -> Vec<u64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) % max + 1
        })
        .collect()
}
