//! Test utilities for spork development.
//!
//! Provides a [`RecordingCallback`] that captures reported errors, the
//! instrumented [`FaultyBackend`](fixtures::FaultyBackend), byte-pattern
//! helpers for checking that pushed memory survives growth, and
//! [`all_backends`] for running a scenario once per provider.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex};

use spork_arena::{ErrorCallback, ErrorCode};
use spork_platform::{HeapMemory, MemoryBackend};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Every provider available on this target: the heap chain, plus virtual
/// memory where the OS has it.
pub fn all_backends() -> Vec<Arc<dyn MemoryBackend>> {
    let mut backends: Vec<Arc<dyn MemoryBackend>> = vec![Arc::new(HeapMemory::new())];
    if let Some(vm) = spork_platform::native() {
        backends.push(vm);
    }
    backends
}

/// Error callback that records every `(code, message)` it receives.
#[derive(Clone, Default)]
pub struct RecordingCallback {
    events: Arc<Mutex<Vec<(ErrorCode, String)>>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback to install in an [`ArenaConfig`](spork_arena::ArenaConfig).
    pub fn callback(&self) -> ErrorCallback {
        let events = Arc::clone(&self.events);
        Arc::new(move |code: ErrorCode, message: &str| {
            if let Ok(mut events) = events.lock() {
                events.push((code, message.to_owned()));
            }
        })
    }

    pub fn events(&self) -> Vec<(ErrorCode, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.events().into_iter().map(|(code, _)| code).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

/// Fill `buf` with a pattern derived from `seed`.
pub fn fill_pattern(buf: &mut [u8], seed: u8) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8).wrapping_mul(31);
    }
}

/// Whether `buf` still holds the pattern written by [`fill_pattern`].
pub fn check_pattern(buf: &[u8], seed: u8) -> bool {
    buf.iter()
        .enumerate()
        .all(|(i, &byte)| byte == seed.wrapping_add(i as u8).wrapping_mul(31))
}
