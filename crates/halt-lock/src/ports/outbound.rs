//! Driven Ports (SPI - Outbound)
//!
//! The OS lock manager seen from this crate: range locks on a raw
//! descriptor. Implementations must never log, retry or poll.

use std::os::unix::io::RawFd;

use crate::domain::{ByteRange, HaltState, Holder};
use crate::error::LockResult;

/// Lock flavour requested on a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many shared holders may coexist; excludes exclusive holders.
    Shared,
    /// Single holder; excludes everyone else.
    Exclusive,
}

/// Whose lock table entry a granted lock belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// Tied to the open file description behind the handle.
    ///
    /// Two handles in one process conflict; closing the last descriptor of
    /// the description releases its locks.
    OpenFileDescription,
    /// Tied to the process. Handles in one process never conflict with each
    /// other, and closing *any* descriptor on the file drops all the
    /// process's locks on it.
    Process,
}

/// A conflicting lock reported by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// Mode of the conflicting lock.
    pub mode: LockMode,
    /// Range the conflicting lock covers.
    pub range: ByteRange,
    /// Who holds it.
    pub holder: Holder,
}

impl Conflict {
    /// HALT state implied by an exclusive-mode query on the HALT range.
    pub fn halt_state(conflict: Option<Conflict>) -> HaltState {
        match conflict {
            None => HaltState::Unlocked,
            Some(c) if c.mode == LockMode::Exclusive => HaltState::Halted { holder: c.holder },
            Some(c) => HaltState::Admitting { holder: c.holder },
        }
    }
}

/// Byte-range advisory lock driver.
pub trait RangeLocker: Send + Sync {
    /// Block the calling thread until `range` is granted in `mode`.
    ///
    /// The thread sleeps in the kernel; there is no timeout.
    fn lock(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<()>;

    /// Attempt to take `range` without waiting.
    ///
    /// Returns `LockError::Contended` when another handle holds a
    /// conflicting lock.
    fn try_lock(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<()>;

    /// Release `range`. Releasing an unheld range succeeds.
    fn unlock(&self, fd: RawFd, range: ByteRange) -> LockResult<()>;

    /// Report the first lock that would conflict with `mode` on `range`.
    fn query(&self, fd: RawFd, range: ByteRange, mode: LockMode) -> LockResult<Option<Conflict>>;

    /// Scope of the locks this driver hands out.
    fn scope(&self) -> LockScope;
}
