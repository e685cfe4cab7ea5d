//! Platform-level failures.

use std::io;

/// Errors returned by a [`MemoryBackend`](crate::MemoryBackend).
///
/// Reserve and commit failures are always surfaced; decommit and release
/// are best-effort and never fail from the caller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS (or the heap allocator) refused to hand out a new range.
    #[error("failed to reserve {size} bytes")]
    ReserveFailed {
        /// Size of the rejected reservation in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Read/write access could not be granted on a reserved range.
    #[error("failed to commit {size} bytes")]
    CommitFailed {
        /// Size of the rejected commit in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A reservation request that no allocator can satisfy
    /// (zero bytes, or a size that overflows the layout rules).
    #[error("invalid reservation: {size} bytes aligned to {align}")]
    InvalidLayout {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },
}

impl PlatformError {
    pub(crate) fn reserve(size: usize, source: io::Error) -> Self {
        Self::ReserveFailed { size, source }
    }

    pub(crate) fn commit(size: usize, source: io::Error) -> Self {
        Self::CommitFailed { size, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_names_the_size() {
        let err = PlatformError::reserve(4096, io::Error::from(io::ErrorKind::OutOfMemory));
        assert_eq!(err.to_string(), "failed to reserve 4096 bytes");
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_layout_has_no_source() {
        let err = PlatformError::InvalidLayout { size: 0, align: 4096 };
        assert!(err.source().is_none());
        assert!(err.to_string().contains("0 bytes"));
    }
}
