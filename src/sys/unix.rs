use std::{
    error::Error,
    ffi::CStr,
    fmt, io,
    ptr::{null_mut, NonNull},
};

use lazy_static::lazy_static;

pub type RawCode = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemError(RawCode);

impl Error for SystemError {}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", io::Error::from_raw_os_error(self.0))
    }
}

impl SystemError {
    /// Wraps a raw `errno` value.
    pub const fn from_raw(code: RawCode) -> Self {
        Self(code)
    }

    /// The `errno` value reported by the platform.
    pub const fn raw(&self) -> RawCode {
        self.0
    }

    fn from_errno() -> Self {
        Self(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

// Only used if `sysconf` cannot report the page size, which POSIX does not allow.
const FALLBACK_PAGE_SIZE: usize = 4096;

lazy_static! {
    static ref PAGE_SIZE: usize = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => {
            log::warn!(
                "sysconf(_SC_PAGESIZE) failed ({}), assuming {FALLBACK_PAGE_SIZE} byte pages",
                SystemError::from_errno(),
            );
            FALLBACK_PAGE_SIZE
        }
    };
}

pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// An anonymous shared-memory object, held as an inaccessible mapping of its full length.
///
/// Its pages live in RAM while hot and are written out to swap under memory pressure.
#[derive(Debug)]
pub struct Storage {
    base: NonNull<u8>,
    size: usize,
}

// Safety: `Storage` is an owning handle to an address range; it is never dereferenced through.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

pub fn reserve(label: &CStr, size: usize) -> Result<Storage, SystemError> {
    let base_addr = unsafe {
        // According to https://web.archive.org/web/20230517221903/https://www.kernel.org/doc/html/v4.19/vm/overcommit-accounting.html...
        //
        // ```
        // For an anonymous or /dev/zero map
        // SHARED - size of mapping
        // ```
        //
        // N.B. `MAP_SHARED | MAP_ANONYMOUS` without `MAP_NORESERVE` creates a shmem object whose
        // whole length is charged against the commit limit right here, regardless of `prot`. If
        // the system cannot back it, this fails with `ENOMEM` instead of leaving the shortfall to
        // a page fault. No page is populated.
        libc::mmap(
            null_mut(),
            size,
            libc::PROT_NONE,
            libc::MAP_SHARED | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if base_addr == libc::MAP_FAILED {
        return Err(SystemError::from_errno());
    }

    let Some(base) = NonNull::new(base_addr.cast::<u8>()) else {
        return Err(SystemError(libc::ENOMEM));
    };
    let storage = Storage { base, size };

    if let Err(err) = make_private(&storage) {
        if let Err(release_err) = release(storage) {
            log::error!("failed to release storage that could not be made private: {release_err}");
        }
        return Err(err);
    }

    name_object(&storage, label);

    Ok(storage)
}

cfgenius::cond! {
    if cfg(any(target_os = "linux", target_os = "android")) {
        // From `include/uapi/linux/prctl.h`.
        const PR_SET_VMA: libc::c_int = 0x53564d41;
        const PR_SET_VMA_ANON_NAME: libc::c_ulong = 0;

        fn make_private(storage: &Storage) -> Result<(), SystemError> {
            // Shared mappings would otherwise be shared with `fork` children.
            let result = unsafe {
                libc::madvise(storage.base.as_ptr().cast(), storage.size, libc::MADV_DONTFORK)
            };

            if result != 0 {
                Err(SystemError::from_errno())
            } else {
                Ok(())
            }
        }

        fn name_object(storage: &Storage, label: &CStr) {
            // Shows up as `[anon_shmem:<label>]` in `/proc/<pid>/maps`. Kernels before 6.2 reject
            // naming shared mappings, which only costs us the label.
            let result = unsafe {
                libc::prctl(
                    PR_SET_VMA,
                    PR_SET_VMA_ANON_NAME,
                    storage.base.as_ptr() as libc::c_ulong,
                    storage.size as libc::c_ulong,
                    label.as_ptr(),
                )
            };

            if result != 0 {
                log::debug!(
                    "could not label storage at {:p}: {}",
                    storage.base,
                    SystemError::from_errno(),
                );
            }
        }
    } else {
        fn make_private(_storage: &Storage) -> Result<(), SystemError> {
            Ok(())
        }

        fn name_object(_storage: &Storage, _label: &CStr) {}
    }
}

pub fn map(storage: &Storage, size: usize) -> Result<NonNull<u8>, SystemError> {
    debug_assert!(size <= storage.size);

    if unsafe {
        libc::mprotect(
            storage.base.as_ptr().cast(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
        )
    } != 0
    {
        return Err(SystemError::from_errno());
    }

    Ok(storage.base)
}

pub unsafe fn unmap(base: NonNull<u8>, size: usize) -> Result<(), SystemError> {
    if libc::mprotect(base.as_ptr().cast(), size, libc::PROT_NONE) != 0 {
        Err(SystemError::from_errno())
    } else {
        Ok(())
    }
}

pub fn release(storage: Storage) -> Result<(), SystemError> {
    if unsafe { libc::munmap(storage.base.as_ptr().cast(), storage.size) } != 0 {
        Err(SystemError::from_errno())
    } else {
        Ok(())
    }
}
