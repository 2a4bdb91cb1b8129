use std::{fmt, ptr::NonNull, slice};

use crate::{
    backend::{Backend, SystemBackend},
    error::{ErrorKind, RegionError},
};

/// A contiguous, read-write range of swap-backed memory owned by this value.
///
/// Dropping the region unmaps the range and then releases its storage object.
pub struct Region<B: Backend = SystemBackend> {
    base: NonNull<u8>,
    size: usize,
    // `None` once released.
    storage: Option<B::Storage>,
    backend: B,
}

// Safety: the region is the sole owner of its view and storage object; moving it to another thread
// moves both.
unsafe impl<B> Send for Region<B>
where
    B: Backend + Send,
    B::Storage: Send,
{
}

// Safety: `&Region` only permits reads of the mapped bytes.
unsafe impl<B> Sync for Region<B>
where
    B: Backend + Sync,
    B::Storage: Sync,
{
}

impl Region {
    /// Creates a region of `size` bytes backed by the system's swap.
    ///
    /// The full capacity is charged against the system's commit limit before this returns, so
    /// later writes to the region cannot fail for lack of backing storage. Nothing is populated up
    /// front; pages are zero until written.
    ///
    /// The guarantee is only as strong as the platform's commit accounting. Windows always
    /// enforces it. Linux enforces it unless `vm.overcommit_memory` is set to `1`. macOS does no
    /// commit accounting at all, so there a region larger than the system can back is created
    /// successfully and the shortfall surfaces when its pages are touched.
    ///
    /// ## Errors
    ///
    /// - [`ErrorKind::ZeroSize`] if `size` is zero.
    /// - [`ErrorKind::BackingStorageReservationFailed`] if the platform cannot provide `size` bytes
    ///   of committed storage. Sizes the platform cannot represent at all, such as `usize::MAX`,
    ///   land here too.
    /// - [`ErrorKind::MappingFailed`] if the storage could not be mapped read-write into this
    ///   process, e.g. because the address space or the process' mapping count is exhausted.
    ///
    /// No resources are held after an error.
    pub fn create(size: usize) -> Result<Self, RegionError> {
        Self::create_in(SystemBackend::default(), size)
    }
}

impl<B: Backend> Region<B> {
    /// Creates a region of `size` bytes using `backend`. See [`Region::create`].
    pub fn create_in(backend: B, size: usize) -> Result<Self, RegionError> {
        if size == 0 {
            log::debug!("rejected zero-sized region");
            return Err(RegionError::zero_size());
        }

        let storage = match backend.reserve(size) {
            Ok(storage) => storage,
            Err(err) => {
                log::debug!("failed to reserve {size} bytes of backing storage: {err}");
                return Err(RegionError::platform(
                    ErrorKind::BackingStorageReservationFailed,
                    err,
                ));
            }
        };

        let base = match backend.map(&storage, size) {
            Ok(base) => base,
            Err(err) => {
                log::debug!("failed to map {size} bytes of backing storage: {err}");

                if let Err(release_err) = backend.release(storage) {
                    log::error!("failed to release unmapped backing storage: {release_err}");
                }
                return Err(RegionError::platform(ErrorKind::MappingFailed, err));
            }
        };

        log::debug!("created {size} byte region at {base:p}");

        Ok(Self {
            base,
            size,
            storage: Some(storage),
            backend,
        })
    }

    /// The requested size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The first byte of the region. Stays the same for the region's whole life and dangles once
    /// it is dropped.
    pub fn base_address(&self) -> NonNull<u8> {
        self.base
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe {
            // Safety: `Backend::map` guarantees `size` readable bytes until we unmap them, which
            // only happens once `self` is gone.
            slice::from_raw_parts(self.base.as_ptr(), self.size)
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe {
            // Safety: as above, and `&mut self` makes this the only live view of the bytes.
            slice::from_raw_parts_mut(self.base.as_ptr(), self.size)
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Unmaps and releases the region now rather than at the end of its scope.
    pub fn destroy(self) {
        drop(self);
    }

    fn release(&mut self) {
        let Some(storage) = self.storage.take() else {
            return;
        };

        // The view must go before the storage object it refers to.
        if let Err(err) = unsafe { self.backend.unmap(self.base, self.size) } {
            log::error!("failed to unmap region at {:p}: {err}", self.base);
        }

        if let Err(err) = self.backend.release(storage) {
            log::error!("failed to release backing storage of region at {:p}: {err}", self.base);
        }

        log::debug!("destroyed {} byte region at {:p}", self.size, self.base);
    }
}

impl<B: Backend> Drop for Region<B> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<B: Backend> fmt::Debug for Region<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish()
    }
}
