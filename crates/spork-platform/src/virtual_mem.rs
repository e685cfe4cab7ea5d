//! Virtual-memory provider.
//!
//! Reservations are address space only; pages become readable and
//! writable when committed and are handed back to the OS on decommit.
//! A decommitted range reads as zero after the next commit.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::backend::{BackendKind, MemoryBackend};
use crate::error::PlatformError;

/// OS virtual memory (mmap family on Unix, `VirtualAlloc` on Windows).
#[derive(Clone, Debug)]
pub struct VirtualMemory {
    page_size: usize,
}

impl VirtualMemory {
    /// The provider for this target, or `None` where the OS has no
    /// reserve/commit primitives.
    pub fn new() -> Option<Self> {
        if cfg!(any(unix, windows)) {
            Some(Self {
                page_size: os_page_size(),
            })
        } else {
            None
        }
    }
}

/// OS page size, or [`FALLBACK_PAGE_SIZE`](crate::FALLBACK_PAGE_SIZE)
/// if the query fails.
pub(crate) fn os_page_size() -> usize {
    sys::page_size()
        .filter(|p| p.is_power_of_two())
        .unwrap_or(crate::FALLBACK_PAGE_SIZE)
}

impl MemoryBackend for VirtualMemory {
    fn kind(&self) -> BackendKind {
        BackendKind::VirtualMemory
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn reserve(&self, size: usize) -> Result<NonNull<u8>, PlatformError> {
        if size == 0 {
            return Err(PlatformError::InvalidLayout {
                size,
                align: self.page_size,
            });
        }
        let ptr = sys::reserve(size).map_err(|e| PlatformError::reserve(size, e))?;
        tracing::trace!(size, ?ptr, "reserved address range");
        Ok(ptr)
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> Result<(), PlatformError> {
        if size == 0 {
            return Ok(());
        }
        // SAFETY: forwarded from the caller's contract.
        unsafe { sys::commit(ptr, size) }.map_err(|e| PlatformError::commit(size, e))
    }

    unsafe fn decommit(&self, ptr: NonNull<u8>, size: usize) {
        if size == 0 {
            return;
        }
        // SAFETY: forwarded from the caller's contract.
        if let Err(err) = unsafe { sys::decommit(ptr, size) } {
            tracing::warn!(size, error = %err, "decommit failed");
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded from the caller's contract.
        if let Err(err) = unsafe { sys::release(ptr, size) } {
            tracing::warn!(size, error = %err, "release failed");
        }
    }
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::ptr::{self, NonNull};

    pub(super) fn page_size() -> Option<usize> {
        // SAFETY: sysconf has no preconditions.
        let value = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        usize::try_from(value).ok().filter(|&v| v > 0)
    }

    pub(super) fn reserve(size: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: anonymous private mapping with no fixed address.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    pub(super) unsafe fn commit(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: range lies inside a mapping we own (caller contract).
        let rc = unsafe {
            libc::mprotect(
                ptr.as_ptr().cast(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "linux")]
    pub(super) unsafe fn decommit(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: range lies inside a private anonymous mapping we own;
        // MADV_DONTNEED drops the pages so they fault back in as zero.
        let rc = unsafe { libc::madvise(ptr.as_ptr().cast(), size, libc::MADV_DONTNEED) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: same range.
        let rc = unsafe { libc::mprotect(ptr.as_ptr().cast(), size, libc::PROT_NONE) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub(super) unsafe fn decommit(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: remapping a range we own with MAP_FIXED replaces it with
        // fresh zero pages and no access.
        let mapped = unsafe {
            libc::mmap(
                ptr.as_ptr().cast(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
                -1,
                0,
            )
        };
        if mapped == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub(super) unsafe fn release(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: (ptr, size) is exactly one mapping (caller contract).
        let rc = unsafe { libc::munmap(ptr.as_ptr().cast(), size) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::io;
    use std::ptr::{self, NonNull};

    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_NOACCESS, PAGE_READWRITE,
    };
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    pub(super) fn page_size() -> Option<usize> {
        // SAFETY: GetSystemInfo fills the struct and cannot fail.
        let info = unsafe {
            let mut info: SYSTEM_INFO = std::mem::zeroed();
            GetSystemInfo(&mut info);
            info
        };
        usize::try_from(info.dwPageSize).ok().filter(|&v| v > 0)
    }

    pub(super) fn reserve(size: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: reserving fresh address space has no preconditions.
        let ptr = unsafe { VirtualAlloc(ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(io::Error::last_os_error)
    }

    pub(super) unsafe fn commit(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: range lies inside a reservation we own (caller contract).
        let out = unsafe {
            VirtualAlloc(
                ptr.as_ptr().cast_const().cast(),
                size,
                MEM_COMMIT,
                PAGE_READWRITE,
            )
        };
        if out.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub(super) unsafe fn decommit(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: range lies inside a reservation we own (caller contract).
        let ok = unsafe { VirtualFree(ptr.as_ptr().cast(), size, MEM_DECOMMIT) };
        if ok != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub(super) unsafe fn release(ptr: NonNull<u8>, _size: usize) -> io::Result<()> {
        // SAFETY: ptr is the base of a reservation (caller contract);
        // MEM_RELEASE requires size 0.
        let ok = unsafe { VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE) };
        if ok != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::io;
    use std::ptr::NonNull;

    fn unsupported() -> io::Error {
        io::Error::from(io::ErrorKind::Unsupported)
    }

    pub(super) fn page_size() -> Option<usize> {
        None
    }

    pub(super) fn reserve(_size: usize) -> io::Result<NonNull<u8>> {
        Err(unsupported())
    }

    pub(super) unsafe fn commit(_ptr: NonNull<u8>, _size: usize) -> io::Result<()> {
        Err(unsupported())
    }

    pub(super) unsafe fn decommit(_ptr: NonNull<u8>, _size: usize) -> io::Result<()> {
        Err(unsupported())
    }

    pub(super) unsafe fn release(_ptr: NonNull<u8>, _size: usize) -> io::Result<()> {
        Err(unsupported())
    }
}
