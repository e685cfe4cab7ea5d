//! Arena lifecycle, push/pop and temp scope FFI.
//!
//! Each arena sits behind its own `Arc<Mutex<_>>`; the global `ARENAS`
//! table lock is held only for handle lookup, so different arenas can be
//! used from different threads at the same time.

use std::ffi::{c_char, c_void};
use std::sync::{Arc, Mutex};

use spork_arena::{Arena, ArenaConfig};

use crate::handle::HandleTable;
use crate::status::SporkStatus;
use crate::types::{wrap_callback, SporkErrorCallback, SporkTemp};

pub(crate) type ArenaArc = Arc<Mutex<Arena>>;

static ARENAS: Mutex<HandleTable<ArenaArc>> = Mutex::new(HandleTable::new());

/// Clone the Arc for an arena handle, briefly locking the global table.
pub(crate) fn get_arena(handle: u64) -> Option<ArenaArc> {
    ARENAS.lock().ok()?.get(handle).cloned()
}

pub(crate) fn arenas() -> &'static Mutex<HandleTable<ArenaArc>> {
    &ARENAS
}

/// Create an arena. `growable` is a boolean (0 = fixed size).
///
/// `block_size` 0 selects the default block size. On success the handle
/// is written to `handle_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_create(
    reserve_size: u64,
    block_size: u64,
    growable: u8,
    handle_out: *mut u64,
) -> i32 {
    spork_arena_create_ex(
        reserve_size,
        block_size,
        growable,
        0,
        None,
        std::ptr::null_mut(),
        handle_out,
    )
}

/// Create an arena with an explicit alignment and an error callback.
///
/// `alignment` must be a power of two no larger than the page size; 0
/// selects pointer alignment. `callback` (may be null) runs synchronously on the thread whose call
/// failed, including for a failure of this very call. `user_data` is
/// passed back untouched.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_create_ex(
    reserve_size: u64,
    block_size: u64,
    growable: u8,
    alignment: usize,
    callback: SporkErrorCallback,
    user_data: *mut c_void,
    handle_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return SporkStatus::InvalidArgument as i32;
        }
        let mut config = ArenaConfig::new(reserve_size, block_size)
            .with_growable(growable != 0)
            .with_alignment(alignment);
        if let Some(callback) = wrap_callback(callback, user_data) {
            config = config.with_error_callback(callback);
        }
        let arena = match Arena::new(config) {
            Ok(arena) => arena,
            Err(e) => return SporkStatus::from(&e) as i32,
        };
        let id = arena.id();
        let handle = ffi_lock!(ARENAS).insert(Arc::new(Mutex::new(arena)));
        tracing::debug!(handle, arena = %id, "ffi arena created");
        // SAFETY: handle_out is non-null and valid per caller contract.
        unsafe { *handle_out = handle };
        SporkStatus::Ok as i32
    })
}

/// Destroy an arena and release its memory. Destroying a stale handle
/// returns `SPORK_STATUS_INVALID_HANDLE`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(ARENAS).remove(handle) {
            Some(_) => SporkStatus::Ok as i32,
            None => SporkStatus::InvalidHandle as i32,
        }
    })
}

/// Write the arena's current position to `pos_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_get_pos(handle: u64, pos_out: *mut u64) -> i32 {
    ffi_guard!({
        if pos_out.is_null() {
            return SporkStatus::InvalidArgument as i32;
        }
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        let pos = ffi_lock!(arena).pos();
        // SAFETY: pos_out is non-null and valid per caller contract.
        unsafe { *pos_out = pos };
        SporkStatus::Ok as i32
    })
}

/// Push `size` bytes, zeroed unless `non_zero` is set.
///
/// On failure `*ptr_out` is set to null and the position is unchanged.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_push(
    handle: u64,
    size: u64,
    non_zero: u8,
    ptr_out: *mut *mut c_void,
) -> i32 {
    ffi_guard!({
        if ptr_out.is_null() {
            return SporkStatus::InvalidArgument as i32;
        }
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        let mut arena = ffi_lock!(arena);
        let pushed = if non_zero != 0 {
            arena.push_non_zero(size)
        } else {
            arena.push(size)
        };
        let (ptr, status) = match pushed {
            Ok(ptr) => (ptr.as_ptr().cast::<c_void>(), SporkStatus::Ok),
            Err(e) => (std::ptr::null_mut(), SporkStatus::from(&e)),
        };
        // SAFETY: ptr_out is non-null and valid per caller contract.
        unsafe { *ptr_out = ptr };
        status as i32
    })
}

/// Pop `size` bytes. Popping more than is in use clamps to 0 and returns
/// `SPORK_STATUS_CANNOT_POP_MORE`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_pop(handle: u64, size: u64) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        let popped = ffi_lock!(arena).pop(size);
        match popped {
            Ok(()) => SporkStatus::Ok as i32,
            Err(e) => SporkStatus::from(&e) as i32,
        }
    })
}

/// Roll back to `pos`. A position at or past the current one is a no-op.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_pop_to(handle: u64, pos: u64) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        ffi_lock!(arena).pop_to(pos);
        SporkStatus::Ok as i32
    })
}

/// Roll back to position 0.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_reset(handle: u64) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        ffi_lock!(arena).reset();
        SporkStatus::Ok as i32
    })
}

/// Begin a temp scope: record the current position in `temp_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_temp_begin(handle: u64, temp_out: *mut SporkTemp) -> i32 {
    ffi_guard!({
        if temp_out.is_null() {
            return SporkStatus::InvalidArgument as i32;
        }
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

/// End a temp scope: roll its arena back to the recorded position.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_temp_end(temp: SporkTemp) -> i32 {
    spork_arena_pop_to(temp.arena, temp.pos)
}

/// Read and clear the arena's last error.
///
/// Writes the error code (0 when there is none) to `code_out` and the
/// full message length, excluding the terminator, to `len_out`. Up to
/// `buf_cap - 1` message bytes are copied into `buf` followed by a NUL;
/// a longer message is truncated but still cleared. Any of the out
/// pointers may be null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn spork_arena_get_error(
    handle: u64,
    code_out: *mut u32,
    buf: *mut c_char,
    buf_cap: usize,
    len_out: *mut usize,
) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(handle) else {
            return SporkStatus::InvalidHandle as i32;
        };
        let error = ffi_lock!(arena).take_error();
        let (code, message) = match &error {
            Some(e) => (e.code() as u32, e.to_string()),
            None => (0, String::new()),
        };
        if !code_out.is_null() {
            // SAFETY: code_out is non-null and valid per caller contract.
            unsafe { *code_out = code };
        }
        if !len_out.is_null() {
            // SAFETY: len_out is non-null and valid per caller contract.
            unsafe { *len_out = message.len() };
        }
        if !buf.is_null() && buf_cap > 0 {
            let n = message.len().min(buf_cap - 1);
            // SAFETY: buf points to at least buf_cap writable bytes and
            // n < buf_cap; the source is a live String of at least n bytes.
            unsafe {
                std::ptr::copy_nonoverlapping(message.as_ptr().cast::<c_char>(), buf, n);
                *buf.add(n) = 0;
            }
        }
        SporkStatus::Ok as i32
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(reserve: u64, growable: bool) -> u64 {
        let mut handle = 0;
        assert_eq!(
            spork_arena_create(reserve, 0, u8::from(growable), &mut handle),
            SporkStatus::Ok as i32
        );
        handle
    }

    #[test]
    fn create_push_destroy() {
        let h = create(1 << 20, false);
        let mut ptr = std::ptr::null_mut();
        assert_eq!(spork_arena_push(h, 100, 0, &mut ptr), 0);
        assert!(!ptr.is_null());
        let mut pos = 0;
        assert_eq!(spork_arena_get_pos(h, &mut pos), 0);
        assert!(pos >= 100);
        assert_eq!(spork_arena_destroy(h), 0);
        assert_eq!(
            spork_arena_get_pos(h, &mut pos),
            SporkStatus::InvalidHandle as i32
        );
        assert_eq!(spork_arena_destroy(h), SporkStatus::InvalidHandle as i32);
    }

    #[test]
    fn null_out_pointers_are_rejected() {
        assert_eq!(
            spork_arena_create(1 << 20, 0, 0, std::ptr::null_mut()),
            SporkStatus::InvalidArgument as i32
        );
        let h = create(1 << 20, false);
        assert_eq!(
            spork_arena_push(h, 8, 0, std::ptr::null_mut()),
            SporkStatus::InvalidArgument as i32
        );
        assert_eq!(
            spork_arena_get_pos(h, std::ptr::null_mut()),
            SporkStatus::InvalidArgument as i32
        );
        spork_arena_destroy(h);
    }

    #[test]
    fn zero_reserve_fails_init() {
        let mut handle = 0;
        assert_eq!(
            spork_arena_create(0, 0, 0, &mut handle),
            SporkStatus::InitFailed as i32
        );
        assert_eq!(handle, 0);
    }

    #[test]
    fn pop_underflow_clamps_and_reports() {
        let h = create(1 << 20, false);
        let mut ptr = std::ptr::null_mut();
        spork_arena_push(h, 100, 0, &mut ptr);
        assert_eq!(spork_arena_pop(h, 40), 0);
        assert_eq!(
            spork_arena_pop(h, 1 << 20),
            SporkStatus::CannotPopMore as i32
        );
        let mut pos = 1;
        spork_arena_get_pos(h, &mut pos);
        assert_eq!(pos, 0);
        assert_eq!(spork_arena_pop(h, 0), 0);
        spork_arena_destroy(h);
    }

    #[test]
    fn create_ex_applies_alignment() {
        let mut h = 0;
        assert_eq!(
            spork_arena_create_ex(1 << 20, 0, 0, 256, None, std::ptr::null_mut(), &mut h),
            0
        );
        let mut ptr = std::ptr::null_mut();
        for size in [3, 1, 17] {
            assert_eq!(spork_arena_push(h, size, 0, &mut ptr), 0);
            assert_eq!(ptr as usize % 256, 0);
        }
        spork_arena_destroy(h);

        let mut bad = 0;
        assert_eq!(
            spork_arena_create_ex(1 << 20, 0, 0, 24, None, std::ptr::null_mut(), &mut bad),
            SporkStatus::InitFailed as i32
        );
        assert_eq!(bad, 0);
    }

    #[test]
    fn temp_scope_rolls_back() {
        let h = create(1 << 20, false);
        let mut ptr = std::ptr::null_mut();
        spork_arena_push(h, 64, 0, &mut ptr);
        let mut temp = SporkTemp::default();
        assert_eq!(spork_arena_temp_begin(h, &mut temp), 0);
        assert_eq!(temp.arena, h);
        spork_arena_push(h, 4096, 1, &mut ptr);
        assert_eq!(spork_arena_temp_end(temp), 0);
        let mut pos = 0;
        spork_arena_get_pos(h, &mut pos);
        assert_eq!(pos, temp.pos);
        spork_arena_destroy(h);
    }
}
