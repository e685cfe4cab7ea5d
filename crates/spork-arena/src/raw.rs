//! Low-level primitives for arena memory operations.
//!
//! Every `unsafe` operation on arena memory outside the backends lives
//! here or in `chain.rs`, each with a `// SAFETY:` comment.

#![allow(unsafe_code)]

use std::ptr::NonNull;

/// Fill `len` bytes at `ptr` with zero.
///
/// # Safety
///
/// `ptr..ptr + len` must be committed, writable, and not aliased by a
/// live reference.
pub(crate) unsafe fn zero(ptr: NonNull<u8>, len: usize) {
    // SAFETY: caller contract.
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
}

/// View `len` bytes at `ptr` as a mutable slice for lifetime `'a`.
///
/// # Safety
///
/// The range must be committed, initialised (arena memory always is:
/// fresh pages are zero and pushed bytes were zeroed or written), and
/// exclusively owned for `'a`.
pub(crate) unsafe fn bytes_mut<'a>(ptr: NonNull<u8>, len: usize) -> &'a mut [u8] {
    // SAFETY: caller contract.
    unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), len) }
}

/// View `count` values of `T` at `ptr` as a mutable slice.
///
/// # Safety
///
/// As [`bytes_mut`], plus `ptr` aligned for `T` and every bit pattern of
/// the range a valid `T` (the caller only instantiates this with `Copy`
/// types it has just written).
pub(crate) unsafe fn slice_mut<'a, T>(ptr: NonNull<T>, count: usize) -> &'a mut [T] {
    // SAFETY: caller contract.
    unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), count) }
}

/// Copy the concatenation of `parts` into `dst` and view it as `str`.
///
/// `dst.len()` must equal the total byte length of `parts`.
pub(crate) fn concat_into<'a, 'p>(
    dst: &'a mut [u8],
    parts: impl IntoIterator<Item = &'p str>,
) -> &'a mut str {
    let mut at = 0;
    for part in parts {
        let end = at + part.len();
        dst[at..end].copy_from_slice(part.as_bytes());
        at = end;
    }
    assert_eq!(at, dst.len(), "concatenated length mismatch");
    // SAFETY: `dst` is exactly the concatenation of complete `str`s, each
    // valid UTF-8, so the whole is valid UTF-8.
    unsafe { std::str::from_utf8_unchecked_mut(dst) }
}
