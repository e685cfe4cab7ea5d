//! Per-thread scratch arenas over FFI.
//!
//! The first `spork_scratch_get` on a thread creates that thread's scratch
//! arenas and registers them in the arena handle table. A thread-local
//! guard removes them again when the thread exits, so their handles go
//! stale instead of leaking. A slot whose handle was destroyed through
//! `spork_arena_destroy` is recreated on the next request.
//!
//! Scratch failures have no arena of their own to report into, so they go
//! to the process-wide callback installed with
//! `spork_scratch_set_error_callback`.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::{Arc, Mutex};

use spork_arena::{Arena, ArenaError, ErrorCallback, ScratchConfig};

use crate::arena::{arenas, get_arena, spork_arena_temp_end};
use crate::status::SporkStatus;
use crate::types::{wrap_callback, SporkErrorCallback, SporkTemp};

static SCRATCH_CALLBACK: Mutex<Option<ErrorCallback>> = Mutex::new(None);

fn scratch_callback() -> Option<ErrorCallback> {
    SCRATCH_CALLBACK.lock().ok()?.clone()
}

/// Log `err`, hand it to the scratch callback and convert it to a status.
fn report(err: &ArenaError) -> SporkStatus {
    let code = err.code();
    let message = err.to_string();
    tracing::warn!(%code, "{message}");
    if let Some(callback) = scratch_callback() {
        callback(code, &message);
    }
    SporkStatus::from(err)
}

#[derive(Default)]
struct ThreadScratch {
    // Handle 0 marks a slot that has not been created yet.
    handles: Vec<u64>,
}

impl ThreadScratch {
    /// Make sure every slot holds a live arena.
    fn refresh(&mut self) -> Result<(), SporkStatus> {
        let config = ScratchConfig::default();
        self.handles.resize(config.slots, 0);
        for slot in 0..self.handles.len() {
            if get_arena(self.handles[slot]).is_some() {
                continue;
            }
            let mut arena_config = config.arena.clone();
            if let Some(callback) = scratch_callback() {
                arena_config = arena_config.with_error_callback(callback);
            }
            // Construction failures already went through the callback.
            let arena = Arena::new(arena_config).map_err(|e| SporkStatus::from(&e))?;
            let handle = arenas()
                .lock()
                .map_err(|_| SporkStatus::InternalError)?
                .insert(Arc::new(Mutex::new(arena)));
            tracing::debug!(slot, handle, "ffi scratch arena created");
            self.handles[slot] = handle;
        }
        Ok(())
    }

    fn pick(&self, conflicts: &[u64]) -> Result<u64, SporkStatus> {
        self.handles
            .iter()
            .copied()
            .find(|handle| !conflicts.contains(handle))
            .ok_or_else(|| {
                report(&ArenaError::ScratchUnavailable {
                    conflicts: conflicts.len(),
                    slots: self.handles.len(),
                })
            })
    }
}

impl Drop for ThreadScratch {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        if let Ok(mut table) = arenas().lock() {
            for handle in self.handles.drain(..) {
                table.remove(handle);
            }
        }
    }
}

thread_local! {
    static THREAD_SCRATCH: RefCell<ThreadScratch> = RefCell::new(ThreadScratch::default());
}

/// Install the callback for scratch failures, replacing any previous one.
///
/// It receives `SPORK_STATUS_SCRATCH_UNAVAILABLE` conditions from
/// `spork_scratch_get` and becomes the error callback of scratch arenas
/// created after this call, on any thread. A null `callback` removes it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_scratch_set_error_callback(
    callback: SporkErrorCallback,
    user_data: *mut c_void,
) -> i32 {
    ffi_guard!({
        let mut slot = ffi_lock!(SCRATCH_CALLBACK);
        *slot = wrap_callback(callback, user_data);
        SporkStatus::Ok as i32
    })
}

/// Begin a temp scope on one of this thread's scratch arenas that is not
/// among the `n_conflicts` arena handles in `conflicts`.
///
/// `conflicts` may be null when `n_conflicts` is 0. Returns
/// `SPORK_STATUS_SCRATCH_UNAVAILABLE` when every scratch arena conflicts,
/// or when called while the thread is exiting.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_scratch_get(
    conflicts: *const u64,
    n_conflicts: usize,
    temp_out: *mut SporkTemp,
) -> i32 {
    ffi_guard!({
        if temp_out.is_null() || (conflicts.is_null() && n_conflicts > 0) {
            return SporkStatus::InvalidArgument as i32;
        }
        let conflicts: &[u64] = if n_conflicts == 0 {
            &[]
        } else {
            // SAFETY: conflicts points to n_conflicts valid handles.
            unsafe { std::slice::from_raw_parts(conflicts, n_conflicts) }
        };

        let picked = THREAD_SCRATCH.try_with(|scratch| {
            let mut scratch = scratch.borrow_mut();
            scratch.refresh()?;
            scratch.pick(conflicts)
        });
        let handle = match picked {
            Ok(Ok(handle)) => handle,
            Ok(Err(status)) => return status as i32,
            Err(_) => {
                let err = ArenaError::ScratchUnavailable {
                    conflicts: conflicts.len(),
                    slots: 0,
                };
                return report(&err) as i32;
            }
        };

        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        let pos = ffi_lock!(arena).pos();
        // SAFETY: temp_out is non-null and valid per caller contract.
        unsafe {
            *temp_out = SporkTemp {
                arena: handle,
                pos,
            }
        };
        SporkStatus::Ok as i32
    })
}

/// End a scratch scope, rolling its arena back.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_scratch_release(temp: SporkTemp) -> i32 {
    spork_arena_temp_end(temp)
}
