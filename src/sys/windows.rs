// win32 quick reference:
// https://docs.rs/windows-sys/latest/windows_sys/index.html
// https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/
// https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/nf-memoryapi-createfilemappingw
// https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/nf-memoryapi-mapviewoffile
// https://learn.microsoft.com/en-us/windows/win32/api/memoryapi/nf-memoryapi-unmapviewoffile

use std::{
    error::Error,
    ffi::CStr,
    fmt, io,
    mem::MaybeUninit,
    ptr::{null, NonNull},
};

use lazy_static::lazy_static;
use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, HANDLE, INVALID_HANDLE_VALUE},
    System::{
        Memory::{
            CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_WRITE, PAGE_READWRITE,
            SEC_COMMIT,
        },
        SystemInformation::{GetSystemInfo, SYSTEM_INFO},
    },
};

pub type RawCode = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemError(RawCode);

impl Error for SystemError {}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", io::Error::from_raw_os_error(self.0 as i32))
    }
}

impl SystemError {
    /// Wraps a raw `GetLastError` value.
    pub const fn from_raw(code: RawCode) -> Self {
        Self(code)
    }

    /// The `GetLastError` value reported by the platform.
    pub const fn raw(&self) -> RawCode {
        self.0
    }

    fn from_errno() -> Self {
        Self(unsafe {
            // Safety: `GetLastError`'s internal errno is stored using TLS.
            GetLastError()
        })
    }
}

lazy_static! {
    static ref PAGE_SIZE: usize = {
        let sys_info = unsafe {
            let mut sys_info = MaybeUninit::<SYSTEM_INFO>::uninit();
            GetSystemInfo(sys_info.as_mut_ptr());
            sys_info.assume_init()
        };

        // N.B. views are placed at `dwAllocationGranularity` boundaries but sized in
        // `dwPageSize` units, so the latter is what callers can observe.
        sys_info.dwPageSize as usize
    };
}

pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// A section object backed by the system paging file.
#[derive(Debug)]
pub struct Storage {
    handle: HANDLE,
}

pub fn reserve(_label: &CStr, size: usize) -> Result<Storage, SystemError> {
    let size = size as u64;
    let high = (size >> 32) as u32;
    let low = (size & 0xffff_ffff) as u32;

    let handle = unsafe {
        CreateFileMappingW(
            /* file */ INVALID_HANDLE_VALUE,
            /* security attributes */ null(),
            PAGE_READWRITE | SEC_COMMIT,
            high,
            low,
            /* name; unnamed so no other process can open it */ null(),
        )
    };

    if handle == 0 {
        Err(SystemError::from_errno())
    } else {
        Ok(Storage { handle })
    }
}

pub fn map(storage: &Storage, _size: usize) -> Result<NonNull<u8>, SystemError> {
    // A zero length maps the entire section.
    let view = unsafe {
        MapViewOfFile(
            storage.handle,
            FILE_MAP_WRITE,
            /* offset high */ 0,
            /* offset low */ 0,
            /* length */ 0,
        )
    };

    NonNull::new(view as *mut u8).ok_or_else(SystemError::from_errno)
}

pub unsafe fn unmap(base: NonNull<u8>, _size: usize) -> Result<(), SystemError> {
    if UnmapViewOfFile(base.as_ptr() as _) == 0 {
        Err(SystemError::from_errno())
    } else {
        Ok(())
    }
}

pub fn release(storage: Storage) -> Result<(), SystemError> {
    if unsafe { CloseHandle(storage.handle) } == 0 {
        Err(SystemError::from_errno())
    } else {
        Ok(())
    }
}
