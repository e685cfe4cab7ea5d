//! Arena error types and their stable codes.

use std::fmt;

use crate::config::ConfigError;

/// Stable numeric code for every reportable arena error.
///
/// This is what error callbacks receive and what crosses the C boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// The arena could not be created.
    InitFailed = 1,
    /// A heap block could not be allocated while growing.
    MallocFailed = 2,
    /// Pages could not be committed, or a new reservation failed.
    CommitFailed = 3,
    /// A push would exceed the capacity of a fixed-size arena.
    OutOfMemory = 4,
    /// A pop asked for more bytes than the arena holds.
    CannotPopMore = 5,
    /// Every scratch slot was conflicted or already in use.
    ScratchUnavailable = 6,
}

impl ErrorCode {
    /// Upper-case name, e.g. `"OUT_OF_MEMORY"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitFailed => "INIT_FAILED",
            Self::MallocFailed => "MALLOC_FAILED",
            Self::CommitFailed => "COMMIT_FAILED",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::CannotPopMore => "CANNOT_POP_MORE",
            Self::ScratchUnavailable => "SCRATCH_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// The backend refused the initial reservation or block.
    #[error("arena initialisation failed: {reason}")]
    InitFailed {
        /// Backend failure description.
        reason: String,
    },
    /// The configuration was rejected before touching the backend.
    #[error("invalid arena configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// A heap block could not be allocated.
    #[error("failed to allocate {requested} byte block: {reason}")]
    MallocFailed {
        /// Size of the block that was requested.
        requested: u64,
        /// Backend failure description.
        reason: String,
    },
    /// Virtual memory could not be committed or reserved.
    #[error("failed to commit {requested} bytes: {reason}")]
    CommitFailed {
        /// Bytes that were being committed or reserved.
        requested: u64,
        /// Backend failure description.
        reason: String,
    },
    /// The push does not fit and the arena may not grow.
    #[error(
        "arena out of memory: requested {requested} bytes at position {position}, capacity {capacity}"
    )]
    OutOfMemory {
        /// Bytes requested by the push.
        requested: u64,
        /// Position at the time of the push.
        position: u64,
        /// Capacity at the time of the push.
        capacity: u64,
    },
    /// Pop underflow; the arena was clamped to position 0.
    #[error("cannot pop {requested} bytes, only {available} in use")]
    CannotPopMore {
        /// Bytes the caller asked to pop.
        requested: u64,
        /// Bytes that were actually in use.
        available: u64,
    },
    /// Every scratch slot was conflicted or held by a live scope.
    #[error("no scratch arena available ({conflicts} conflicts, {slots} slots)")]
    ScratchUnavailable {
        /// Number of conflicting arenas passed by the caller.
        conflicts: usize,
        /// Slots in the pool.
        slots: usize,
    },
}

impl ArenaError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InitFailed { .. } | Self::InvalidConfig(_) => ErrorCode::InitFailed,
            Self::MallocFailed { .. } => ErrorCode::MallocFailed,
            Self::CommitFailed { .. } => ErrorCode::CommitFailed,
            Self::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            Self::CannotPopMore { .. } => ErrorCode::CannotPopMore,
            Self::ScratchUnavailable { .. } => ErrorCode::ScratchUnavailable,
        }
    }
}
