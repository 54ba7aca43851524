//! Error types for the halt lock
//!
//! Every failure carries enough to tell an expected outcome (contention,
//! timeout) apart from an OS-level fault. The errno is never swallowed.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Halt lock errors
#[derive(Debug, Error)]
pub enum LockError {
    /// The supplied descriptor is not open (EBADF). Not retried.
    #[error("Invalid lock file handle (fd {fd})")]
    InvalidHandle { fd: i32 },

    /// The lock syscall failed for a reason other than contention.
    ///
    /// Covers interrupted calls, missing lock support on the filesystem and
    /// resource limits. Surfaced verbatim; retry policy belongs to the caller.
    #[error("Lock syscall failed (errno {code}): {source}")]
    OsLockFailure {
        code: i32,
        #[source]
        source: io::Error,
    },

    /// A non-blocking attempt found the range held through another handle.
    #[error("Lock range {offset}+{len} is held by another handle")]
    Contended { offset: u64, len: u64 },

    /// A caller-layered deadline elapsed before the lock was granted.
    #[error("Timed out after {waited:?} waiting for the halt lock")]
    TimedOut { waited: Duration },

    /// The worker thread running a blocking halt went away without answering.
    #[error("Halt worker exited before reporting a result")]
    WorkerLost,

    /// The platform or storage cannot provide exclusive handle-scoped locks.
    #[error("Unsupported lock configuration: {reason}")]
    Unsupported { reason: String },

    /// Opening or closing the lock file failed.
    #[error("Lock file I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::config::ConfigError),
}

impl LockError {
    /// Build an error from the current `errno` after a failed syscall.
    pub(crate) fn from_errno(fd: i32, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::EBADF) => LockError::InvalidHandle { fd },
            Some(code) => LockError::OsLockFailure { code, source },
            None => LockError::Io(source),
        }
    }

    /// The preserved OS error code, if this failure came from a syscall.
    pub fn code(&self) -> Option<i32> {
        match self {
            LockError::InvalidHandle { .. } => Some(libc::EBADF),
            LockError::OsLockFailure { code, .. } => Some(*code),
            LockError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// True for outcomes a caller should expect during normal operation.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::Contended { .. } | LockError::TimedOut { .. })
    }
}

/// Result type for halt lock operations
pub type LockResult<T> = Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebadf_maps_to_invalid_handle() {
        let err = LockError::from_errno(-1, io::Error::from_raw_os_error(libc::EBADF));
        assert!(matches!(err, LockError::InvalidHandle { fd: -1 }));
        assert_eq!(err.code(), Some(libc::EBADF));
    }

    #[test]
    fn test_other_errno_is_preserved() {
        let err = LockError::from_errno(3, io::Error::from_raw_os_error(libc::EINTR));
        assert!(matches!(err, LockError::OsLockFailure { code, .. } if code == libc::EINTR));
        assert_eq!(err.code(), Some(libc::EINTR));
        assert!(!err.is_contention());
    }

    #[test]
    fn test_contention_is_expected() {
        let err = LockError::Contended { offset: 72, len: 1 };
        assert!(err.is_contention());
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "Lock range 72+1 is held by another handle");
    }
}
