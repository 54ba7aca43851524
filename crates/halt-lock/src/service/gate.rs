//! # Write Gate
//!
//! The primary's side of the protocol. Before a commit, the write path asks
//! the gate for a permit. Admission takes a *shared* lock on the HALT byte
//! without waiting:
//!
//! - refused when a halt holds the byte exclusively, so the write is withheld
//! - granted otherwise, and kept until the permit drops, so a halt requested
//!   mid-write waits for that write to finish
//!
//! fcntl does not queue shared requests behind a waiting exclusive one; a
//! steady stream of writes can keep a halt waiting. No fairness is promised.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::adapters::{FcntlLocker, LockFileHandle};
use crate::domain::{GateDecision, LockSlot};
use crate::error::{LockError, LockResult};
use crate::ports::{LockMode, RangeLocker, WriteGateApi};

/// Shared state between the gate and its permits.
///
/// All permits of one gate share one open file description, whose shared
/// lock is a single kernel entry. The count keeps it until the last permit.
struct GateInner<L> {
    handle: Arc<LockFileHandle>,
    locker: L,
    active: Mutex<usize>,
}

/// Write admission over the HALT byte.
pub struct WriteGate<L: RangeLocker = FcntlLocker> {
    inner: Arc<GateInner<L>>,
}

impl WriteGate<FcntlLocker> {
    /// Gate over `handle` using fcntl locks.
    ///
    /// Give the gate its own handle. Locks taken through one open file
    /// description never conflict with each other, so a halt held through
    /// the same handle would be converted rather than respected.
    pub fn new(handle: Arc<LockFileHandle>) -> Self {
        Self::with_locker(handle, FcntlLocker)
    }
}

impl<L: RangeLocker> WriteGate<L> {
    /// Gate with an explicit locker.
    pub fn with_locker(handle: Arc<LockFileHandle>, locker: L) -> Self {
        Self {
            inner: Arc::new(GateInner {
                handle,
                locker,
                active: Mutex::new(0),
            }),
        }
    }

    /// Writes currently holding a permit.
    pub fn active_permits(&self) -> usize {
        *self.inner.active.lock()
    }
}

impl<L: RangeLocker> WriteGateApi for WriteGate<L> {
    type Permit = WritePermit<L>;

    fn admit(&self) -> LockResult<GateDecision<WritePermit<L>>> {
        let inner = &self.inner;
        let mut active = inner.active.lock();

        if *active == 0 {
            match inner.locker.try_lock(
                inner.handle.as_raw_fd(),
                LockSlot::Halt.range(),
                LockMode::Shared,
            ) {
                Ok(()) => {}
                Err(LockError::Contended { .. }) => {
                    debug!("Write withheld: HALT is held");
                    return Ok(GateDecision::Halted);
                }
                Err(e) => return Err(e),
            }
        }
        *active += 1;

        Ok(GateDecision::Admit(WritePermit {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn is_halted(&self) -> LockResult<bool> {
        let conflict = self.inner.locker.query(
            self.inner.handle.as_raw_fd(),
            LockSlot::Halt.range(),
            LockMode::Shared,
        )?;
        Ok(conflict.is_some())
    }
}

/// Admission for one write. Halts wait while any permit is alive.
#[must_use = "dropping the permit ends the admitted write"]
pub struct WritePermit<L: RangeLocker = FcntlLocker> {
    inner: Arc<GateInner<L>>,
}

impl<L: RangeLocker> Drop for WritePermit<L> {
    fn drop(&mut self) {
        let inner = &self.inner;
        let mut active = inner.active.lock();
        *active = active.saturating_sub(1);
        if *active > 0 {
            return;
        }
        if let Err(e) = inner
            .locker
            .unlock(inner.handle.as_raw_fd(), LockSlot::Halt.range())
        {
            error!(error = %e, "Failed to release write admission on HALT byte");
        }
    }
}
