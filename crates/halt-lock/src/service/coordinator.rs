//! # Halt Coordinator
//!
//! Caller-side layer over the HALT primitive: applies the self-exempt policy,
//! hands out an RAII guard, and logs. The primitive itself stays silent.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::adapters::{probe_with, FcntlLocker, LockFileHandle};
use crate::domain::{HaltConfig, HaltOutcome, HaltState, LockSlot, ReleaseReason};
use crate::error::{LockError, LockResult};
use crate::ports::{Conflict, HaltApi, HaltHold, LockMode, RangeLocker};

/// Coordinates halts over one lock file.
///
/// The coordinator's own handle is kept for the node's lifetime and used
/// for state queries. Each halt takes the lock through a fresh open file
/// description owned by its guard: locks on one description never conflict
/// with each other, so two guards sharing one could both "hold" HALT.
pub struct HaltCoordinator<L: RangeLocker + Clone = FcntlLocker> {
    handle: Arc<LockFileHandle>,
    locker: L,
    config: HaltConfig,
}

impl HaltCoordinator<FcntlLocker> {
    /// Validate `config`, open the lock file and run the capability check.
    pub fn open(config: HaltConfig) -> LockResult<Self> {
        config.validate()?;
        let path = config.lock_file_path()?;
        let handle = LockFileHandle::open(&path)?;

        let capability = probe_with(&FcntlLocker, &path)?;
        if config.require_exclusive {
            capability.require_exclusive(&path)?;
        } else if !capability.is_exclusive() {
            warn!(
                path = %path.display(),
                "Continuing with non-exclusive range locks; halts may overlap"
            );
        }

        info!(
            path = %path.display(),
            self_exempt = config.self_exempt,
            "Halt coordinator ready"
        );
        Ok(Self::new(handle, config))
    }

    /// Coordinator over an already-open handle.
    pub fn new(handle: LockFileHandle, config: HaltConfig) -> Self {
        Self::with_locker(Arc::new(handle), FcntlLocker, config)
    }
}

impl<L: RangeLocker + Clone> HaltCoordinator<L> {
    /// Coordinator with an explicit locker.
    pub fn with_locker(handle: Arc<LockFileHandle>, locker: L, config: HaltConfig) -> Self {
        Self {
            handle,
            locker,
            config,
        }
    }

    /// The coordinator's own handle, used for state queries.
    pub fn handle(&self) -> &Arc<LockFileHandle> {
        &self.handle
    }

    /// The locker in use.
    pub fn locker(&self) -> &L {
        &self.locker
    }

    /// Active configuration.
    pub fn config(&self) -> &HaltConfig {
        &self.config
    }

    /// A new description for one halt.
    fn halt_handle(&self) -> LockResult<Arc<LockFileHandle>> {
        Ok(Arc::new(self.handle.reopen()?))
    }

    fn guard(&self, handle: Arc<LockFileHandle>, outcome: HaltOutcome) -> HaltGuard<L> {
        HaltGuard {
            handle,
            locker: self.locker.clone(),
            outcome,
            acquired_at: Instant::now(),
            released: outcome == HaltOutcome::Exempt,
        }
    }

    fn exempt(&self) -> HaltGuard<L> {
        debug!("Halt skipped: node is self-exempt");
        self.guard(Arc::clone(&self.handle), HaltOutcome::Exempt)
    }
}

#[cfg(feature = "async-runtime")]
impl<L: RangeLocker + Clone + 'static> HaltCoordinator<L> {
    /// Halt without blocking the executor, honouring `config.halt_timeout`.
    pub async fn halt_async(&self) -> LockResult<HaltGuard<L>> {
        use super::blocking::{halt_async_with, halt_with_timeout_with};

        if self.config.self_exempt {
            return Ok(self.exempt());
        }

        let started = Instant::now();
        let handle = self.halt_handle()?;
        let locker = self.locker.clone();
        let acquired = match self.config.halt_timeout {
            Some(timeout) => halt_with_timeout_with(locker, Arc::clone(&handle), timeout).await,
            None => halt_async_with(locker, Arc::clone(&handle)).await,
        };
        acquired.inspect_err(|e| warn!(error = %e, "HALT lock acquisition failed"))?;

        info!(
            waited_ms = started.elapsed().as_millis() as u64,
            "HALT lock acquired; writes paused"
        );
        Ok(self.guard(handle, HaltOutcome::Acquired))
    }
}

impl<L: RangeLocker + Clone> HaltApi for HaltCoordinator<L> {
    type Guard = HaltGuard<L>;

    fn halt(&self) -> LockResult<HaltGuard<L>> {
        if self.config.self_exempt {
            return Ok(self.exempt());
        }

        let started = Instant::now();
        let handle = self.halt_handle()?;
        debug!(path = %handle.path().display(), "Waiting for HALT lock");
        self.locker
            .lock(handle.as_raw_fd(), LockSlot::Halt.range(), LockMode::Exclusive)
            .inspect_err(|e| warn!(error = %e, "HALT lock acquisition failed"))?;

        info!(
            waited_ms = started.elapsed().as_millis() as u64,
            "HALT lock acquired; writes paused"
        );
        Ok(self.guard(handle, HaltOutcome::Acquired))
    }

    fn try_halt(&self) -> LockResult<Option<HaltGuard<L>>> {
        if self.config.self_exempt {
            return Ok(Some(self.exempt()));
        }

        let handle = self.halt_handle()?;
        match self
            .locker
            .try_lock(handle.as_raw_fd(), LockSlot::Halt.range(), LockMode::Exclusive)
        {
            Ok(()) => {
                info!("HALT lock acquired; writes paused");
                Ok(Some(self.guard(handle, HaltOutcome::Acquired)))
            }
            Err(LockError::Contended { .. }) => {
                debug!("HALT lock is held elsewhere");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn state(&self) -> LockResult<HaltState> {
        let conflict = self.locker.query(
            self.handle.as_raw_fd(),
            LockSlot::Halt.range(),
            LockMode::Exclusive,
        )?;
        Ok(Conflict::halt_state(conflict))
    }
}

/// A halt in effect. Dropping it unhalts and closes its description.
///
/// Prefer [`HaltHold::unhalt`] where the caller can act on a failure; the
/// drop path can only log it.
#[must_use = "dropping the guard releases the halt immediately"]
pub struct HaltGuard<L: RangeLocker + Clone = FcntlLocker> {
    handle: Arc<LockFileHandle>,
    locker: L,
    outcome: HaltOutcome,
    acquired_at: Instant,
    released: bool,
}

impl<L: RangeLocker + Clone> HaltGuard<L> {
    /// Handle the halt is held through (the coordinator's own when exempt).
    pub fn handle(&self) -> &Arc<LockFileHandle> {
        &self.handle
    }

    fn release(&mut self) -> LockResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.locker
            .unlock(self.handle.as_raw_fd(), LockSlot::Halt.range())?;
        info!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            reason = ?ReleaseReason::Unhalt,
            "HALT lock released; writes resume"
        );
        Ok(())
    }
}

impl<L: RangeLocker + Clone> HaltHold for HaltGuard<L> {
    fn outcome(&self) -> HaltOutcome {
        self.outcome
    }

    fn unhalt(mut self) -> LockResult<()> {
        self.release().inspect_err(|e| {
            error!(
                error = %e,
                "Unhalt FAILED; writes stay paused until the lock file handle closes"
            )
        })
    }
}

impl<L: RangeLocker + Clone> Drop for HaltGuard<L> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(
                error = %e,
                "Unhalt on drop FAILED; writes stay paused until the lock file handle closes"
            );
        }
    }
}

impl<L: RangeLocker + Clone> std::fmt::Debug for HaltGuard<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaltGuard")
            .field("path", &self.handle.path())
            .field("outcome", &self.outcome)
            .field("released", &self.released)
            .finish()
    }
}

impl<L: RangeLocker + Clone> std::fmt::Debug for HaltCoordinator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaltCoordinator")
            .field("path", &self.handle.path())
            .field("scope", &self.locker.scope())
            .field("config", &self.config)
            .finish()
    }
}
