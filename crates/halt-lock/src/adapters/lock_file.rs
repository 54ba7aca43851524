//! # Lock File Handle
//!
//! Owns the open descriptor onto `<database>-lock`. Every lock taken through
//! the handle is released by the kernel when the handle is closed, dropped or
//! when the process exits. There is no other release path to get wrong.
//!
//! The file is opened read/write so both shared and exclusive record locks
//! are permitted. It is never truncated and never written to.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::domain::lock_file_path;
use crate::error::{LockError, LockResult};

/// Permission bits for a newly created lock file (before umask).
pub const LOCK_FILE_MODE: u32 = 0o666;

/// Open handle onto a database lock file.
///
/// # Example
///
/// ```ignore
/// let handle = LockFileHandle::for_database(Path::new("/litefs/app.db"))?;
/// halt(&handle)?;
/// // writes are paused on the primary
/// unhalt(&handle)?;
/// ```
#[derive(Debug)]
pub struct LockFileHandle {
    /// Kept open for as long as any lock must be held.
    file: File,
    /// Path of the lock file.
    path: PathBuf,
}

impl LockFileHandle {
    /// Open (creating if missing) the lock file at `path`.
    pub fn open(path: impl AsRef<Path>) -> LockResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(LOCK_FILE_MODE)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Open the lock file belonging to the database at `database_path`.
    pub fn for_database(database_path: impl AsRef<Path>) -> LockResult<Self> {
        Self::open(lock_file_path(database_path.as_ref()))
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying file.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Open a second, independent handle (a new open file description).
    ///
    /// Unlike `File::try_clone`, which duplicates the descriptor and so shares
    /// its locks, the new handle competes for locks with this one.
    pub fn reopen(&self) -> LockResult<Self> {
        Self::open(&self.path)
    }

    /// Close the handle, releasing every lock held through it.
    ///
    /// Dropping the handle has the same effect; this variant reports a
    /// failing `close(2)` instead of ignoring it.
    pub fn close(self) -> LockResult<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` was just released from the owning File, so nothing
        // else will close it again.
        let rc = unsafe { libc::close(fd) };
        if rc == -1 {
            return Err(LockError::from_errno(fd, io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl AsRawFd for LockFileHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fcntl::{halt, try_halt, unhalt};

    #[test]
    fn test_for_database_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let handle = LockFileHandle::for_database(&db).expect("should open");
        assert_eq!(handle.path(), dir.path().join("app.db-lock"));
        assert!(handle.path().exists());
        assert!(!db.exists(), "database file itself is never created");
    }

    #[test]
    fn test_open_does_not_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db-lock");
        std::fs::write(&path, b"keep").unwrap();

        let handle = LockFileHandle::open(&path).unwrap();
        halt(&handle).unwrap();
        unhalt(&handle).unwrap();
        handle.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reopen_is_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = LockFileHandle::open(dir.path().join("x-lock")).unwrap();
        let b = a.reopen().unwrap();

        assert!(try_halt(&a).unwrap());
        assert!(!try_halt(&b).unwrap(), "second description must be refused");

        a.close().unwrap();
        assert!(try_halt(&b).unwrap(), "close releases the lock");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_try_clone_shares_locks() {
        let dir = tempfile::tempdir().unwrap();
        let a = LockFileHandle::open(dir.path().join("x-lock")).unwrap();
        let dup = a.file().try_clone().unwrap();

        assert!(try_halt(&a).unwrap());
        // Same open file description: no conflict.
        assert!(try_halt(&dup).unwrap());
    }
}
