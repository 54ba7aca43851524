//! # haltctl Commands
//!
//! Each command resolves its configuration from `HALT_*` environment
//! variables first, then applies command-line overrides.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use halt_lock::{
    halt_state, probe_capability, HaltConfig, HaltCoordinator, HaltHold, HaltState,
    LockCapability, LockFileHandle,
};

/// Merge CLI overrides onto the environment configuration and validate.
pub fn resolve_config(database: Option<PathBuf>, timeout_ms: Option<u64>) -> Result<HaltConfig> {
    let mut config = HaltConfig::from_env().context("Invalid HALT_* environment")?;
    if let Some(path) = database {
        config.database_path = Some(path);
    }
    if let Some(ms) = timeout_ms {
        config.halt_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }
    config.validate().context("Invalid halt configuration")?;
    Ok(config)
}

/// Report the HALT state of the database.
pub fn status(config: &HaltConfig) -> Result<HaltState> {
    let path = config.lock_file_path()?;
    let handle = LockFileHandle::open(&path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;
    let state = halt_state(&handle).context("Failed to query HALT state")?;
    handle.close()?;
    Ok(state)
}

/// Check that the lock file provides exclusive range locks between handles.
pub fn probe(config: &HaltConfig) -> Result<LockCapability> {
    let path = config.lock_file_path()?;
    let capability = probe_capability(&path)
        .with_context(|| format!("Capability probe failed on {}", path.display()))?;
    if config.require_exclusive {
        return Ok(capability.require_exclusive(&path)?);
    }
    Ok(capability)
}

/// Halt until `shutdown` resolves, then unhalt.
pub async fn hold<F>(config: HaltConfig, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    let coordinator = HaltCoordinator::open(config).context("Failed to start halt coordinator")?;
    let guard = coordinator.halt_async().await.context("Failed to halt writes")?;
    info!("Writes halted; waiting for shutdown signal");

    shutdown.await;

    guard.unhalt().context("Failed to unhalt writes")?;
    Ok(())
}

/// Run `program` with writes halted and return its exit code.
///
/// Unhalt runs even when the program fails to start. A failed unhalt is
/// logged; process exit closes the handle and releases HALT regardless.
pub async fn exec(config: HaltConfig, program: &str, args: &[String]) -> Result<i32> {
    let coordinator = HaltCoordinator::open(config).context("Failed to start halt coordinator")?;
    let guard = coordinator.halt_async().await.context("Failed to halt writes")?;

    info!(program, "Running command with writes halted");
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await;

    if let Err(e) = guard.unhalt() {
        error!(error = %e, "Unhalt after command FAILED");
    }

    let status = status.with_context(|| format!("Failed to run {}", program))?;
    Ok(exit_code(status))
}

/// Exit code as a shell reports it: `128 + signal` for a killed process.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_requires_database() {
        if std::env::var_os("HALT_DATABASE_PATH").is_some() {
            return;
        }
        assert!(resolve_config(None, None).is_err());
    }

    #[test]
    fn test_resolve_config_overrides() {
        let config = resolve_config(Some(PathBuf::from("/tmp/app.db")), Some(250)).unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/app.db")));
        assert_eq!(config.halt_timeout, Some(Duration::from_millis(250)));

        let config = resolve_config(Some(PathBuf::from("/tmp/app.db")), Some(0)).unwrap();
        assert_eq!(config.halt_timeout, None);
    }

    #[test]
    fn test_status_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let config = HaltConfig::for_database(dir.path().join("app.db"));
        assert_eq!(status(&config).unwrap(), HaltState::Unlocked);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_status_reports_halt() {
        let dir = tempfile::tempdir().unwrap();
        let config = HaltConfig::for_database(dir.path().join("app.db"));
        let holder = LockFileHandle::for_database(dir.path().join("app.db")).unwrap();
        halt_lock::halt(&holder).unwrap();

        assert!(status(&config).unwrap().is_halted());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_probe_local_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let config = HaltConfig::for_database(dir.path().join("app.db"));
        assert!(probe(&config).unwrap().is_exclusive());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_exec_returns_exit_code_and_unhalts() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let code = exec(
            HaltConfig::for_database(&db),
            "sh",
            &["-c".to_string(), "exit 3".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(code, 3);

        let after = LockFileHandle::for_database(&db).unwrap();
        assert!(halt_lock::try_halt(&after).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_exec_reports_signal_death_shell_style() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let code = exec(
            HaltConfig::for_database(&db),
            "sh",
            &["-c".to_string(), "kill -TERM $$".to_string()],
        )
        .await
        .unwrap();
        // SIGTERM is 15.
        assert_eq!(code, 143);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_exec_missing_program_still_unhalts() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        let result = exec(HaltConfig::for_database(&db), "/nonexistent/program", &[]).await;
        assert!(result.is_err());

        let after = LockFileHandle::for_database(&db).unwrap();
        assert!(halt_lock::try_halt(&after).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_hold_releases_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");

        hold(HaltConfig::for_database(&db), async {}).await.unwrap();

        let after = LockFileHandle::for_database(&db).unwrap();
        assert!(halt_lock::try_halt(&after).unwrap());
    }
}
