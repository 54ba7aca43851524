//! # fcntl Range Locks
//!
//! `RangeLocker` over POSIX record locks. On Linux the open-file-description
//! commands (`F_OFD_SETLK`, `F_OFD_SETLKW`, `F_OFD_GETLK`) are used so a lock
//! belongs to the handle rather than the process. Elsewhere the classic
//! process-scoped commands are the fallback; see `LockScope::Process` for the
//! caveats that come with them.
//!
//! Nothing here logs or retries. `EINTR` from a blocking wait is returned as
//! an `OsLockFailure` for the caller to act on.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use libc::{c_int, c_short};

use crate::domain::{ByteRange, HaltState, Holder, LockSlot};
use crate::error::{LockError, LockResult};
use crate::ports::{Conflict, LockMode, LockScope, RangeLocker};

#[cfg(target_os = "linux")]
mod cmd {
    use super::*;

    pub const SET: c_int = libc::F_OFD_SETLK;
    pub const SET_WAIT: c_int = libc::F_OFD_SETLKW;
    pub const GET: c_int = libc::F_OFD_GETLK;
    pub const SCOPE: LockScope = LockScope::OpenFileDescription;
}

#[cfg(not(target_os = "linux"))]
mod cmd {
    use super::*;

    pub const SET: c_int = libc::F_SETLK;
    pub const SET_WAIT: c_int = libc::F_SETLKW;
    pub const GET: c_int = libc::F_GETLK;
    pub const SCOPE: LockScope = LockScope::Process;
}

/// fcntl-backed range locker.
#[derive(Debug, Clone, Copy, Default)]
pub struct FcntlLocker;

impl FcntlLocker {
    /// Create a locker.
    pub const fn new() -> Self {
        Self
    }

    fn fcntl(fd: RawFd, command: c_int, lock: &mut libc::flock) -> LockResult<()> {
        // SAFETY: `lock` is a valid, exclusively borrowed flock for the
        // duration of the call. An invalid fd yields EBADF, not UB.
        let rc = unsafe { libc::fcntl(fd, command, lock as *mut libc::flock) };
        if rc == -1 {
            return Err(LockError::from_errno(fd, io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl RangeLocker for FcntlLocker {
    fn lock(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<()> {
        let mut lock = flock_for(range, lock_type(mode))?;
        Self::fcntl(fd, cmd::SET_WAIT, &mut lock)
    }

    fn try_lock(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<()> {
        let mut lock = flock_for(range, lock_type(mode))?;
        match Self::fcntl(fd, cmd::SET, &mut lock) {
            Err(LockError::OsLockFailure { code, .. })
                if code == libc::EAGAIN || code == libc::EACCES =>
            {
                Err(LockError::Contended {
                    offset: range.offset,
                    len: range.len,
                })
            }
            other => other,
        }
    }

    fn unlock(&self, fd: RawFd, range: ByteRange) -> LockResult<()> {
        let mut lock = flock_for(range, libc::F_UNLCK as c_short)?;
        Self::fcntl(fd, cmd::SET, &mut lock)
    }

    fn query(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<Option<Conflict>> {
        let mut lock = flock_for(range, lock_type(mode))?;
        Self::fcntl(fd, cmd::GET, &mut lock)?;

        if lock.l_type == libc::F_UNLCK as c_short {
            return Ok(None);
        }
        let mode = if lock.l_type == libc::F_WRLCK as c_short {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        };
        Ok(Some(Conflict {
            mode,
            range: ByteRange::new(lock.l_start.max(0) as u64, lock.l_len.max(0) as u64),
            holder: Holder::from_pid(lock.l_pid),
        }))
    }

    fn scope(&self) -> LockScope {
        cmd::SCOPE
    }
}

fn lock_type(mode: LockMode) -> c_short {
    match mode {
        LockMode::Shared => libc::F_RDLCK as c_short,
        LockMode::Exclusive => libc::F_WRLCK as c_short,
    }
}

fn flock_for(range: ByteRange, l_type: c_short) -> LockResult<libc::flock> {
    // A zero length means "through end of file" to fcntl; never what we want.
    if range.len == 0 {
        return Err(os_failure(libc::EINVAL));
    }
    let start = libc::off_t::try_from(range.offset).map_err(|_| os_failure(libc::EOVERFLOW))?;
    let len = libc::off_t::try_from(range.len).map_err(|_| os_failure(libc::EOVERFLOW))?;

    // SAFETY: flock is a plain C struct; all-zero is a valid value and
    // leaves l_pid at 0 as the OFD commands require.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = l_type;
    lock.l_whence = libc::SEEK_SET as c_short;
    lock.l_start = start;
    lock.l_len = len;
    Ok(lock)
}

fn os_failure(code: i32) -> LockError {
    LockError::OsLockFailure {
        code,
        source: io::Error::from_raw_os_error(code),
    }
}

// =============================================================================
// HALT PRIMITIVE
// =============================================================================

/// Block until the HALT lock is held through `handle`.
///
/// The lock is exclusive across every handle on the lock file, including
/// other handles in this process. It stays held until [`unhalt`] is called
/// or the handle's last descriptor is closed, whichever comes first.
///
/// There is no timeout; see `service::blocking` for a caller-side deadline.
pub fn halt<H: AsRawFd + ?Sized>(handle: &H) -> LockResult<()> {
    FcntlLocker.lock(handle.as_raw_fd(), LockSlot::Halt.range(), LockMode::Exclusive)
}

/// Release the HALT lock held through `handle`.
///
/// Succeeds when the lock is not held, so calling it twice is harmless.
pub fn unhalt<H: AsRawFd + ?Sized>(handle: &H) -> LockResult<()> {
    FcntlLocker.unlock(handle.as_raw_fd(), LockSlot::Halt.range())
}

/// Take the HALT lock only if it is free. Returns `false` when held elsewhere.
pub fn try_halt<H: AsRawFd + ?Sized>(handle: &H) -> LockResult<bool> {
    match FcntlLocker.try_lock(handle.as_raw_fd(), LockSlot::Halt.range(), LockMode::Exclusive) {
        Ok(()) => Ok(true),
        Err(LockError::Contended { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read the HALT state from the kernel lock table.
pub fn halt_state<H: AsRawFd + ?Sized>(handle: &H) -> LockResult<HaltState> {
    let conflict = FcntlLocker.query(
        handle.as_raw_fd(),
        LockSlot::Halt.range(),
        LockMode::Exclusive,
    )?;
    Ok(Conflict::halt_state(conflict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::Write;

    fn open(path: &std::path::Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .unwrap()
    }

    #[test]
    fn test_invalid_handle() {
        let closed: RawFd = -1;
        let err = halt(&closed).unwrap_err();
        assert!(matches!(err, LockError::InvalidHandle { fd: -1 }));
        assert!(matches!(unhalt(&closed), Err(LockError::InvalidHandle { .. })));
    }

    #[test]
    fn test_zero_length_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("db-lock"));
        let err = FcntlLocker
            .lock(file.as_raw_fd(), ByteRange::new(72, 0), LockMode::Exclusive)
            .unwrap_err();
        assert_eq!(err.code(), Some(libc::EINVAL));
    }

    #[test]
    fn test_unhalt_without_halt_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("db-lock"));
        unhalt(&file).unwrap();
        unhalt(&file).unwrap();
    }

    #[test]
    fn test_halt_then_unhalt_uncontended() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("db-lock"));
        halt(&file).unwrap();
        // The holder never conflicts with itself.
        assert_eq!(halt_state(&file).unwrap(), HaltState::Unlocked);
        unhalt(&file).unwrap();
    }

    #[test]
    fn test_lock_file_content_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db-lock");
        let mut file = open(&path);
        file.write_all(b"unrelated").unwrap();
        halt(&file).unwrap();
        unhalt(&file).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"unrelated");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_scope_is_ofd_on_linux() {
        assert_eq!(FcntlLocker.scope(), LockScope::OpenFileDescription);
    }
}
