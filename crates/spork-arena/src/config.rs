//! Arena and scratch-pool configuration.

use std::fmt;

use spork_platform::align_up;

use crate::report::ErrorCallback;

/// Configuration for a single [`Arena`](crate::Arena).
///
/// Sizes are requests: the arena rounds them to the backend's page size
/// when it is created (see [`Arena::new`](crate::Arena::new)).
#[derive(Clone)]
pub struct ArenaConfig {
    /// Logical capacity in bytes. Rounded up to a page multiple.
    ///
    /// With the virtual-memory backend this much address space is reserved
    /// up front; with the heap backend it bounds the total size of the
    /// block chain.
    pub reserve_size: u64,

    /// Growth and commit granularity in bytes.
    ///
    /// Rounded up to a page multiple and then to the next power of two.
    /// `0` selects one eighth of the reserve.
    pub block_size: u64,

    /// Alignment of every pointer handed out, in bytes.
    ///
    /// Must be a power of two no larger than the page size. `0` selects
    /// [`DEFAULT_ALIGNMENT`](Self::DEFAULT_ALIGNMENT).
    pub alignment: usize,

    /// Whether the arena may extend its capacity past `reserve_size` by
    /// linking additional regions.
    pub growable: bool,

    /// Invoked synchronously, on the failing thread, for every error the
    /// arena reports.
    pub error_callback: Option<ErrorCallback>,
}

impl ArenaConfig {
    /// Default alignment: pointer size.
    pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<usize>();

    /// Default reserve for arenas built with [`Default`]: 64 MiB.
    pub const DEFAULT_RESERVE_SIZE: u64 = 64 * 1024 * 1024;

    /// Fixed-capacity arena with the given reserve and block size.
    pub fn new(reserve_size: u64, block_size: u64) -> Self {
        Self {
            reserve_size,
            block_size,
            alignment: 0,
            growable: false,
            error_callback: None,
        }
    }

    /// Growable arena with the given reserve and block size.
    pub fn growable(reserve_size: u64, block_size: u64) -> Self {
        Self::new(reserve_size, block_size).with_growable(true)
    }

    /// Override the alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Toggle growth past the reserve.
    pub fn with_growable(mut self, growable: bool) -> Self {
        self.growable = growable;
        self
    }

    /// Install an error callback.
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.error_callback = Some(callback);
        self
    }

    /// Check the configuration against the OS page size without creating
    /// anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve(spork_platform::page_size()).map(|_| ())
    }

    /// Round sizes to `page_size` and fill in defaults.
    pub(crate) fn resolve(&self, page_size: usize) -> Result<Geometry, ConfigError> {
        if self.reserve_size == 0 {
            return Err(ConfigError::ZeroReserve);
        }
        let alignment = match self.alignment {
            0 => Self::DEFAULT_ALIGNMENT,
            a if !a.is_power_of_two() => return Err(ConfigError::AlignmentNotPowerOfTwo(a)),
            a if a > page_size => {
                return Err(ConfigError::AlignmentExceedsPage {
                    alignment: a,
                    page_size,
                })
            }
            a => a,
        };

        let too_large = ConfigError::TooLarge {
            requested: self.reserve_size.max(self.block_size),
        };
        let reserve = usize::try_from(self.reserve_size)
            .ok()
            .and_then(|r| align_up(r, page_size))
            .ok_or_else(|| too_large.clone())?;

        let block_request = match self.block_size {
            0 => (reserve / 8).max(page_size),
            b => usize::try_from(b).map_err(|_| too_large.clone())?,
        };
        let block = align_up(block_request, page_size)
            .and_then(usize::checked_next_power_of_two)
            .ok_or(too_large)?;

        Ok(Geometry {
            page_size,
            reserve,
            block,
            alignment,
        })
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RESERVE_SIZE, 0)
    }
}

impl fmt::Debug for ArenaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaConfig")
            .field("reserve_size", &self.reserve_size)
            .field("block_size", &self.block_size)
            .field("alignment", &self.alignment)
            .field("growable", &self.growable)
            .field("error_callback", &self.error_callback.is_some())
            .finish()
    }
}

/// Sizes after rounding, all in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub page_size: usize,
    pub reserve: usize,
    pub block: usize,
    pub alignment: usize,
}

/// Rejected [`ArenaConfig`] values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `reserve_size` was zero.
    #[error("reserve size must be non-zero")]
    ZeroReserve,
    /// Alignment was not a power of two.
    #[error("alignment {0} is not a power of two")]
    AlignmentNotPowerOfTwo(usize),
    /// Alignment exceeded the page size.
    #[error("alignment {alignment} exceeds the page size {page_size}")]
    AlignmentExceedsPage {
        /// Requested alignment.
        alignment: usize,
        /// Backend page size.
        page_size: usize,
    },
    /// A size overflowed after rounding.
    #[error("size {requested} is too large for this platform")]
    TooLarge {
        /// The offending request.
        requested: u64,
    },
    /// A scratch pool with no slots.
    #[error("scratch pool needs at least one slot")]
    NoScratchSlots,
}

/// Configuration for a [`ScratchPool`](crate::ScratchPool).
#[derive(Clone, Debug)]
pub struct ScratchConfig {
    /// Number of scratch arenas in the pool.
    pub slots: usize,
    /// Configuration used for every scratch arena.
    pub arena: ArenaConfig,
}

impl ScratchConfig {
    /// Default number of slots per pool.
    pub const DEFAULT_SLOTS: usize = 2;
    /// Default scratch reserve: 8 MiB.
    pub const DEFAULT_RESERVE_SIZE: u64 = 8 * 1024 * 1024;
    /// Default scratch block size: 256 KiB.
    pub const DEFAULT_BLOCK_SIZE: u64 = 256 * 1024;

    /// Pool of `slots` arenas with the default scratch geometry.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            arena: ArenaConfig::new(Self::DEFAULT_RESERVE_SIZE, Self::DEFAULT_BLOCK_SIZE),
        }
    }

    /// Replace the per-slot arena configuration.
    pub fn with_arena(mut self, arena: ArenaConfig) -> Self {
        self.arena = arena;
        self
    }

    /// Check slot count and arena geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::NoScratchSlots);
        }
        self.arena.validate()
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOTS)
    }
}
