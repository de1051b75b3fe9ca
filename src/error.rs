//! Device error types.
//!
//! Every failure a caller of the virtual serial device can observe is a
//! `DeviceError`. None of them are fatal: the device keeps working after any of
//! these is returned.

use thiserror::Error;

/// Errors reported synchronously to the caller of a device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Another session already holds the device open.
    #[error("Device is busy: another session holds it open")]
    Busy,

    /// Non-blocking operation could not make progress right now.
    #[error("Operation would block")]
    WouldBlock,

    /// A blocking wait was interrupted before data arrived; the call may be retried.
    #[error("Blocking wait interrupted, restart the call")]
    Interrupted,

    /// Unrecognized control code or malformed control payload.
    #[error("Invalid control command: {0}")]
    InvalidCommand(&'static str),

    /// A caller-supplied buffer could not be transferred.
    #[error("Buffer transfer fault: {0}")]
    TransferFault(&'static str),
}

/// Convenient Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// The errno value a character device driver would return for this error.
    #[cfg(unix)]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Busy => libc::EBUSY,
            Self::WouldBlock => libc::EAGAIN,
            Self::Interrupted => libc::EINTR,
            Self::InvalidCommand(_) => libc::ENOTTY,
            Self::TransferFault(_) => libc::EFAULT,
        }
    }
}

impl From<DeviceError> for std::io::Error {
    fn from(err: DeviceError) -> Self {
        use std::io::ErrorKind;

        let kind = match err {
            DeviceError::Busy => ErrorKind::ResourceBusy,
            DeviceError::WouldBlock => ErrorKind::WouldBlock,
            DeviceError::Interrupted => ErrorKind::Interrupted,
            DeviceError::InvalidCommand(_) => ErrorKind::Unsupported,
            DeviceError::TransferFault(_) => ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}
