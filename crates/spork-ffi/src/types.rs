//! Plain C types shared by the arena and scratch functions.

use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

use spork_arena::{ErrorCallback, ErrorCode};

/// A temp scope as seen from C: the arena handle and the position to roll
/// back to.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SporkTemp {
    /// Arena the scope belongs to.
    pub arena: u64,
    /// Position at `temp_begin`.
    pub pos: u64,
}

/// Error callback: `(code, message, user_data)`.
///
/// `code` is the positive arena error code (1..=6). `message` is a
/// NUL-terminated string valid only for the duration of the call.
pub type SporkErrorCallback =
    Option<extern "C" fn(code: u32, message: *const c_char, user_data: *mut c_void)>;

struct UserData(*mut c_void);

impl UserData {
    fn ptr(&self) -> *mut c_void {
        self.0
    }
}

// SAFETY: the pointer is never dereferenced on the Rust side; it is handed
// back to the caller's callback, which owns its thread-safety contract.
#[allow(unsafe_code)]
unsafe impl Send for UserData {}
#[allow(unsafe_code)]
unsafe impl Sync for UserData {}

/// Wrap a C callback as an arena [`ErrorCallback`].
pub(crate) fn wrap_callback(
    callback: SporkErrorCallback,
    user_data: *mut c_void,
) -> Option<ErrorCallback> {
    let callback = callback?;
    let user_data = UserData(user_data);
    Some(Arc::new(move |code: ErrorCode, message: &str| {
        let message = c_message(message);
        callback(code as u32, message.as_ptr(), user_data.ptr());
    }))
}

/// `message` as a C string, with interior NULs replaced.
pub(crate) fn c_message(message: &str) -> CString {
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_nul_is_replaced() {
        assert_eq!(c_message("a\0b").as_bytes(), b"a b");
    }

    #[test]
    fn null_callback_wraps_to_none() {
        assert!(wrap_callback(None, std::ptr::null_mut()).is_none());
    }
}
