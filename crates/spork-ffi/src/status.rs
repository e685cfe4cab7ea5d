//! C-compatible status codes.
//!
//! The arena error codes keep the numeric values of
//! [`ErrorCode`](spork_arena::ErrorCode), negated.

use spork_arena::{ArenaError, ErrorCode};

/// Status returned by every FFI function.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SporkStatus {
    /// Success.
    Ok = 0,
    /// The arena could not be created.
    InitFailed = -1,
    /// A heap-backed arena could not allocate its next region.
    MallocFailed = -2,
    /// Committing pages failed.
    CommitFailed = -3,
    /// The push does not fit and the arena cannot grow.
    OutOfMemory = -4,
    /// Pop past the start of the arena; position clamped to 0.
    CannotPopMore = -5,
    /// Every scratch arena on this thread is in the conflict list, or the
    /// thread is exiting.
    ScratchUnavailable = -6,
    /// Handle is invalid or was already destroyed.
    InvalidHandle = -16,
    /// A pointer argument is null or a value is out of range.
    InvalidArgument = -17,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -20,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<ErrorCode> for SporkStatus {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::InitFailed => SporkStatus::InitFailed,
            ErrorCode::MallocFailed => SporkStatus::MallocFailed,
            ErrorCode::CommitFailed => SporkStatus::CommitFailed,
            ErrorCode::OutOfMemory => SporkStatus::OutOfMemory,
            ErrorCode::CannotPopMore => SporkStatus::CannotPopMore,
            ErrorCode::ScratchUnavailable => SporkStatus::ScratchUnavailable,
        }
    }
}

impl From<&ArenaError> for SporkStatus {
    fn from(e: &ArenaError) -> Self {
        SporkStatus::from(e.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_values_are_stable() {
        assert_eq!(SporkStatus::Ok as i32, 0);
        assert_eq!(SporkStatus::InitFailed as i32, -1);
        assert_eq!(SporkStatus::MallocFailed as i32, -2);
        assert_eq!(SporkStatus::CommitFailed as i32, -3);
        assert_eq!(SporkStatus::OutOfMemory as i32, -4);
        assert_eq!(SporkStatus::CannotPopMore as i32, -5);
        assert_eq!(SporkStatus::ScratchUnavailable as i32, -6);
        assert_eq!(SporkStatus::InvalidHandle as i32, -16);
        assert_eq!(SporkStatus::InvalidArgument as i32, -17);
        assert_eq!(SporkStatus::InternalError as i32, -20);
        assert_eq!(SporkStatus::Panicked as i32, -128);
    }

    #[test]
    fn arena_codes_are_negated() {
        for code in [
            ErrorCode::InitFailed,
            ErrorCode::MallocFailed,
            ErrorCode::CommitFailed,
            ErrorCode::OutOfMemory,
            ErrorCode::CannotPopMore,
            ErrorCode::ScratchUnavailable,
        ] {
            assert_eq!(SporkStatus::from(code) as i32, -(code as i32));
        }
    }

    #[test]
    fn arena_error_to_status() {
        let err = ArenaError::OutOfMemory {
            requested: 10,
            position: 0,
            capacity: 4,
        };
        assert_eq!(SporkStatus::from(&err), SporkStatus::OutOfMemory);
        let err = ArenaError::CannotPopMore {
            requested: 10,
            available: 4,
        };
        assert_eq!(SporkStatus::from(&err), SporkStatus::CannotPopMore);
    }
}
