use std::fmt;

use thiserror::Error;

use crate::sys::SystemError;

/// The step of region construction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A zero-byte region was requested. Rejected before any platform call.
    ZeroSize,

    /// The swap-backed storage object could not be created or committed, e.g. because the system
    /// ran out of commit charge.
    BackingStorageReservationFailed,

    /// The storage object was reserved but could not be mapped into the address space. The storage
    /// object has already been released by the time this is reported.
    MappingFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZeroSize => "cannot create a zero-sized region",
            Self::BackingStorageReservationFailed => "failed to reserve backing storage",
            Self::MappingFailed => "failed to map backing storage",
        })
    }
}

/// Failure to create a [`Region`](crate::Region).
///
/// The platform code is passed through unmodified; see [`SystemError::raw`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", display(.kind, .cause))]
pub struct RegionError {
    kind: ErrorKind,
    #[source]
    cause: Option<SystemError>,
}

fn display(kind: &ErrorKind, cause: &Option<SystemError>) -> String {
    match cause {
        Some(cause) => format!("{kind}: {cause}"),
        None => kind.to_string(),
    }
}

impl RegionError {
    pub(crate) fn zero_size() -> Self {
        Self {
            kind: ErrorKind::ZeroSize,
            cause: None,
        }
    }

    pub(crate) fn platform(kind: ErrorKind, cause: SystemError) -> Self {
        Self {
            kind,
            cause: Some(cause),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error reported by the platform, if the failure came from a platform call.
    pub fn system_error(&self) -> Option<SystemError> {
        self.cause
    }
}
