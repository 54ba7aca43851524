//! # Scoped Halts
//!
//! Run one piece of work with writes halted: open the database lock file,
//! halt, run, unhalt, close. The handle is opened fresh for every call, so
//! closing it is a second, unconditional release path.

use std::path::Path;

use tracing::error;

use crate::adapters::{halt, unhalt, LockFileHandle};
use crate::domain::ReleaseReason;
use crate::error::LockError;

/// Run `f` while the database at `database_path` is halted.
///
/// `f` runs only once the halt is granted. Unhalt runs whether `f` succeeds
/// or fails, and `f`'s result is returned as-is. A failed unhalt is logged;
/// closing the handle right after releases the lock regardless.
pub fn with_halt<T, E, F>(database_path: impl AsRef<Path>, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<LockError>,
{
    let handle = LockFileHandle::for_database(database_path)?;
    halt(&handle)?;
    let result = f();
    finish(handle);
    result
}

/// Async variant of [`with_halt`]; the halt wait runs on the blocking pool.
#[cfg(feature = "async-runtime")]
pub async fn with_halt_async<T, E, Fut>(database_path: impl AsRef<Path>, work: Fut) -> Result<T, E>
where
    Fut: std::future::Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    use std::sync::Arc;

    let handle = Arc::new(LockFileHandle::for_database(database_path)?);
    super::blocking::halt_async(Arc::clone(&handle)).await?;
    let result = work.await;
    release(&handle);
    // The worker may still hold its clone; the close then follows its drop.
    if let Ok(handle) = Arc::try_unwrap(handle) {
        close(handle);
    }
    result
}

fn finish(handle: LockFileHandle) {
    release(&handle);
    close(handle);
}

fn release(handle: &LockFileHandle) {
    if let Err(e) = unhalt(handle) {
        error!(
            path = %handle.path().display(),
            error = %e,
            fallback = ?ReleaseReason::HandleClosed,
            "Unhalt FAILED; relying on handle close to release HALT"
        );
    }
}

fn close(handle: LockFileHandle) {
    if let Err(e) = handle.close() {
        error!(error = %e, "Closing lock file handle failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{halt_state, try_halt};
    use crate::domain::HaltState;

    #[derive(Debug)]
    #[allow(dead_code)]
    enum WorkError {
        Lock(LockError),
        Failed,
    }

    impl From<LockError> for WorkError {
        fn from(e: LockError) -> Self {
            WorkError::Lock(e)
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_with_halt_holds_during_work() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");
        let observer = LockFileHandle::for_database(&db).unwrap();

        let seen = with_halt(&db, || -> Result<HaltState, WorkError> {
            Ok(halt_state(&observer)?)
        })
        .unwrap();

        assert!(seen.is_halted());
        assert_eq!(halt_state(&observer).unwrap(), HaltState::Unlocked);
    }

    #[test]
    fn test_with_halt_releases_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let result: Result<(), WorkError> = with_halt(&db, || Err(WorkError::Failed));
        assert!(matches!(result, Err(WorkError::Failed)));

        let other = LockFileHandle::for_database(&db).unwrap();
        assert!(try_halt(&other).unwrap());
    }

    #[test]
    fn test_with_halt_surfaces_open_failure() {
        let result: Result<(), WorkError> =
            with_halt("/nonexistent-dir/for/halt/app.db", || Ok(()));
        assert!(matches!(result, Err(WorkError::Lock(LockError::Io(_)))));
    }

    #[cfg(all(target_os = "linux", feature = "async-runtime"))]
    #[tokio::test]
    async fn test_with_halt_async_releases() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");
        let observer = LockFileHandle::for_database(&db).unwrap();

        let halted = with_halt_async(&db, async {
            Ok::<_, LockError>(halt_state(&observer)?.is_halted())
        })
        .await
        .unwrap();

        assert!(halted);
        assert!(try_halt(&observer).unwrap());
    }

    #[cfg(all(target_os = "linux", feature = "async-runtime"))]
    #[tokio::test]
    async fn test_with_halt_async_releases_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let result: Result<(), WorkError> = with_halt_async(&db, async { Err(WorkError::Failed) }).await;
        assert!(matches!(result, Err(WorkError::Failed)));

        let other = LockFileHandle::for_database(&db).unwrap();
        assert!(try_halt(&other).unwrap());
    }
}
