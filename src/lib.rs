//! Swapmap allocates [regions](Region) of memory that are backed by the system's swap (or page
//! file) rather than by a user file, so a region may be larger than physical RAM.
//!
//! ## Terminology
//!
//! - A **storage object** is an anonymous, system-managed object whose pages live in RAM while
//!   they are hot and in swap otherwise. It is never tied to a file the user can see.
//!
//! - A storage object is **committed** when the system has already charged its full capacity
//!   against the commit limit, without populating any of it. Writes to committed memory cannot
//!   fail later for lack of backing.
//!
//! - A **view** is the range of the process' address space through which a storage object's bytes
//!   are read and written directly.
//!
//! A [`Region`] owns exactly one storage object and one view of it. Creating a region commits and
//! maps the storage object; dropping it unmaps the view and then releases the object. A failed
//! creation leaves nothing behind.
//!
//! ```no_run
//! let mut region = swapmap::Region::create(1 << 30)?;
//! region.as_mut_slice().fill(0);
//! # Ok::<(), swapmap::RegionError>(())
//! ```

mod backend;
mod error;
mod region;
mod sys;

pub use self::{
    backend::{Backend, SystemBackend},
    error::{ErrorKind, RegionError},
    region::Region,
    sys::{RawCode, Storage, SystemError},
};

/// The size of a page on this system. Regions do not have to be a multiple of it, but the platform
/// rounds every view up to whole pages.
pub fn page_size() -> usize {
    sys::page_size()
}
