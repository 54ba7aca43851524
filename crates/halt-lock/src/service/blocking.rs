//! # Blocking Offload
//!
//! `halt` parks its thread in the kernel until the lock is granted. On a
//! tokio runtime that wait runs on the blocking pool and the result comes
//! back over a oneshot channel. Unhalt never blocks and runs inline.
//!
//! ## Abandoned waits
//!
//! A blocked fcntl call cannot be interrupted from here. The waiting future
//! owns a [`PendingHalt`]; if that is dropped, by a deadline or by an outer
//! `select!`/`timeout`, before the grant is handed to the caller, it closes
//! the channel and releases a grant already sitting in it. A grant that
//! lands after the close makes the worker's send fail, and the worker
//! releases it instead. The worker thread itself stays parked until the
//! lock frees up.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::adapters::{FcntlLocker, LockFileHandle};
use crate::domain::LockSlot;
use crate::error::{LockError, LockResult};
use crate::ports::{LockMode, RangeLocker};

/// A halt running on the blocking pool, not yet handed to the caller.
struct PendingHalt<L: RangeLocker> {
    rx: oneshot::Receiver<LockResult<()>>,
    locker: L,
    handle: Arc<LockFileHandle>,
    settled: bool,
}

impl<L: RangeLocker + Clone + 'static> PendingHalt<L> {
    fn spawn(locker: L, handle: Arc<LockFileHandle>) -> Self {
        let (tx, rx) = oneshot::channel();
        let worker_locker = locker.clone();
        let worker_handle = Arc::clone(&handle);
        tokio::task::spawn_blocking(move || {
            let range = LockSlot::Halt.range();
            let fd = worker_handle.as_raw_fd();
            let result = worker_locker.lock(fd, range, LockMode::Exclusive);
            if let Err(Ok(())) = tx.send(result) {
                debug!("Halt waiter went away; releasing late HALT grant");
                if let Err(e) = worker_locker.unlock(fd, range) {
                    error!(error = %e, "Releasing late HALT grant FAILED");
                }
            }
        });
        Self {
            rx,
            locker,
            handle,
            settled: false,
        }
    }
}

impl<L: RangeLocker> PendingHalt<L> {
    /// Wait for the worker. Once this returns, the grant belongs to the caller.
    async fn wait(&mut self) -> LockResult<()> {
        let result = (&mut self.rx).await.unwrap_or(Err(LockError::WorkerLost));
        self.settled = true;
        result
    }

    /// Stop waiting. A grant that already arrived is still handed out.
    fn abandon(&mut self, waited: Duration) -> LockResult<()> {
        self.rx.close();
        self.settled = true;
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(_) => Err(LockError::TimedOut { waited }),
        }
    }
}

impl<L: RangeLocker> Drop for PendingHalt<L> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if let Ok(Ok(())) = self.rx.try_recv() {
            debug!("Halt future dropped after grant; releasing HALT");
            if let Err(e) = self
                .locker
                .unlock(self.handle.as_raw_fd(), LockSlot::Halt.range())
            {
                error!(error = %e, "Releasing abandoned HALT grant FAILED");
            }
        }
    }
}

/// Halt through `handle` without blocking the async executor.
///
/// Cancel-safe: dropping the future before it resolves never leaves the
/// lock held.
pub async fn halt_async(handle: Arc<LockFileHandle>) -> LockResult<()> {
    halt_async_with(FcntlLocker, handle).await
}

/// [`halt_async`] with an explicit locker.
pub async fn halt_async_with<L>(locker: L, handle: Arc<LockFileHandle>) -> LockResult<()>
where
    L: RangeLocker + Clone + 'static,
{
    PendingHalt::spawn(locker, handle).wait().await
}

/// Halt through `handle`, giving up after `timeout`.
///
/// Returns `LockError::TimedOut` when the deadline passes first. A grant
/// that races the deadline is returned as success.
pub async fn halt_with_timeout(handle: Arc<LockFileHandle>, timeout: Duration) -> LockResult<()> {
    halt_with_timeout_with(FcntlLocker, handle, timeout).await
}

/// [`halt_with_timeout`] with an explicit locker.
pub async fn halt_with_timeout_with<L>(
    locker: L,
    handle: Arc<LockFileHandle>,
    timeout: Duration,
) -> LockResult<()>
where
    L: RangeLocker + Clone + 'static,
{
    let started = Instant::now();
    let mut pending = PendingHalt::spawn(locker, handle);

    tokio::select! {
        result = pending.wait() => result,
        _ = tokio::time::sleep(timeout) => pending.abandon(started.elapsed()),
    }
}
