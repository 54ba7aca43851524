//! # Capability Probe
//!
//! Some storage layers (several network filesystems, process-scoped lock
//! fallbacks) accept range locks without making them exclusive between
//! handles. That cannot be detected while halting, so it is checked once at
//! startup: lock the PROBE byte through one handle and try it through a
//! second, independent one. The second attempt must be refused.

use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::{debug, warn};

use super::fcntl::FcntlLocker;
use super::lock_file::LockFileHandle;
use crate::domain::LockSlot;
use crate::error::{LockError, LockResult};
use crate::ports::{LockMode, LockScope, RangeLocker};

/// Result of probing a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCapability {
    /// Independent handles exclude each other.
    Exclusive { scope: LockScope },
    /// A second handle was granted a lock the first already held.
    NotExclusive { scope: LockScope },
}

impl LockCapability {
    /// True when halts are safe on this lock file.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, LockCapability::Exclusive { .. })
    }

    /// Turn a degraded result into `LockError::Unsupported`.
    pub fn require_exclusive(self, path: &Path) -> LockResult<Self> {
        match self {
            LockCapability::Exclusive { .. } => Ok(self),
            LockCapability::NotExclusive { scope } => Err(LockError::Unsupported {
                reason: format!(
                    "{} does not provide exclusive range locks between handles ({:?} scope)",
                    path.display(),
                    scope
                ),
            }),
        }
    }
}

/// Probe the lock file at `path` with the default fcntl locker.
pub fn probe_capability(path: impl AsRef<Path>) -> LockResult<LockCapability> {
    probe_with(&FcntlLocker, path.as_ref())
}

/// Probe the lock file at `path` with a given locker.
///
/// Process-scoped lockers are reported as `NotExclusive` without touching
/// the file: closing the probe's descriptors would drop every lock this
/// process holds on it, HALT included.
pub fn probe_with<L: RangeLocker>(locker: &L, path: &Path) -> LockResult<LockCapability> {
    let scope = locker.scope();
    if scope == LockScope::Process {
        warn!(
            path = %path.display(),
            "Process-scoped range locks: handles in one process do not exclude each other"
        );
        return Ok(LockCapability::NotExclusive { scope });
    }

    let range = LockSlot::Probe.range();
    let first = LockFileHandle::open(path)?;
    let second = first.reopen()?;

    locker.try_lock(first.as_raw_fd(), range, LockMode::Exclusive)?;

    let capability = match locker.try_lock(second.as_raw_fd(), range, LockMode::Exclusive) {
        Err(LockError::Contended { .. }) => LockCapability::Exclusive { scope },
        Ok(()) => {
            locker.unlock(second.as_raw_fd(), range)?;
            LockCapability::NotExclusive { scope }
        }
        Err(e) => {
            let _ = locker.unlock(first.as_raw_fd(), range);
            return Err(e);
        }
    };
    locker.unlock(first.as_raw_fd(), range)?;

    match capability {
        LockCapability::Exclusive { .. } => {
            debug!(path = %path.display(), ?scope, "Lock file provides exclusive range locks");
        }
        LockCapability::NotExclusive { .. } => {
            warn!(
                path = %path.display(),
                ?scope,
                "Lock file does NOT provide exclusive range locks between handles"
            );
        }
    }
    Ok(capability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_local_filesystem_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db-lock");
        let capability = probe_capability(&path).unwrap();
        assert_eq!(
            capability,
            LockCapability::Exclusive {
                scope: LockScope::OpenFileDescription
            }
        );
        assert!(capability.require_exclusive(&path).is_ok());
    }

    #[test]
    fn test_not_exclusive_is_rejected() {
        let capability = LockCapability::NotExclusive {
            scope: LockScope::Process,
        };
        let err = capability.require_exclusive(Path::new("/nfs/db-lock")).unwrap_err();
        assert!(matches!(err, LockError::Unsupported { .. }));
        assert!(err.to_string().contains("/nfs/db-lock"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_probe_leaves_halt_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db-lock");
        let holder = LockFileHandle::open(&path).unwrap();
        crate::adapters::fcntl::halt(&holder).unwrap();

        // Probing a halted lock file still works; PROBE is disjoint from HALT.
        assert!(probe_capability(&path).unwrap().is_exclusive());
    }
}
