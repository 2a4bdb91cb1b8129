use std::{
    ffi::{CStr, CString, NulError},
    ptr::NonNull,
};

use crate::sys::{self, SystemError};

/// The platform operations a [`Region`](crate::Region) is built from.
///
/// A region reserves a storage object, maps it, and later unmaps and releases it, in that order.
/// [`SystemBackend`] implements these with the host's swap-backed shared memory; other
/// implementations exist mainly to observe or fail those steps.
///
/// # Safety
///
/// A successful [`map`](Backend::map) must return a pointer to `size` bytes of readable and writable
/// memory that nothing else aliases, and the memory must stay valid until the matching
/// [`unmap`](Backend::unmap). [`Region`](crate::Region) hands out safe slices over it.
pub unsafe trait Backend {
    /// Handle to a reserved storage object.
    type Storage;

    /// Creates a storage object able to hold `size` bytes, with its capacity committed.
    fn reserve(&self, size: usize) -> Result<Self::Storage, SystemError>;

    /// Maps all of `storage` read-write at an address of the platform's choosing.
    fn map(&self, storage: &Self::Storage, size: usize) -> Result<NonNull<u8>, SystemError>;

    /// Removes a view returned by [`map`](Backend::map).
    ///
    /// # Safety
    ///
    /// `base` and `size` must describe a live view from this backend, and nothing may access the
    /// view afterwards.
    unsafe fn unmap(&self, base: NonNull<u8>, size: usize) -> Result<(), SystemError>;

    /// Destroys a storage object. Any view of it must already be unmapped.
    fn release(&self, storage: Self::Storage) -> Result<(), SystemError>;
}

const DEFAULT_LABEL: &str = "swapmap";

/// The host platform's swap-backed memory.
///
/// - Unix: a shared anonymous mapping, reserved inaccessible and charged against the commit limit
///   for its full length, then opened up read-write. On Linux it is also excluded from `fork`
///   children.
/// - Windows: an unnamed section backed by the paging file, created with `SEC_COMMIT`.
#[derive(Debug, Clone)]
pub struct SystemBackend {
    label: CString,
}

impl SystemBackend {
    /// Labels storage objects with `label`. On Linux 6.2 and later the mapping shows up as
    /// `[anon_shmem:<label>]` in `/proc/<pid>/maps`; elsewhere the label is ignored.
    pub fn with_label(label: &str) -> Result<Self, NulError> {
        Ok(Self {
            label: CString::new(label)?,
        })
    }

    pub fn label(&self) -> &CStr {
        &self.label
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self {
            label: CString::new(DEFAULT_LABEL).unwrap_or_default(),
        }
    }
}

unsafe impl Backend for SystemBackend {
    type Storage = sys::Storage;

    fn reserve(&self, size: usize) -> Result<Self::Storage, SystemError> {
        sys::reserve(&self.label, size)
    }

    fn map(&self, storage: &Self::Storage, size: usize) -> Result<NonNull<u8>, SystemError> {
        sys::map(storage, size)
    }

    unsafe fn unmap(&self, base: NonNull<u8>, size: usize) -> Result<(), SystemError> {
        sys::unmap(base, size)
    }

    fn release(&self, storage: Self::Storage) -> Result<(), SystemError> {
        sys::release(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_label() {
        assert_eq!(SystemBackend::default().label().to_str(), Ok("swapmap"));
    }

    #[test]
    fn rejects_interior_nul() {
        assert!(SystemBackend::with_label("swap\0map").is_err());
    }

    #[test]
    fn reserve_then_release() {
        let backend = SystemBackend::default();
        let storage = backend.reserve(crate::page_size()).unwrap();
        backend.release(storage).unwrap();
    }
}
