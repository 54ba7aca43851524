//! # Halt Configuration
//!
//! Caller policy around the primitive: self-exemption on the primary,
//! the optional wait deadline, and whether degraded locking is tolerated.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Suffix appended to the database path to name its lock file.
pub const LOCK_FILE_SUFFIX: &str = "-lock";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No database path configured.
    #[error("Database path is not set (HALT_DATABASE_PATH)")]
    MissingDatabasePath,

    /// A zero timeout would fail every contended halt instantly.
    #[error("Halt timeout must be greater than zero")]
    ZeroTimeout,

    /// An environment variable could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Halt coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltConfig {
    /// Database whose lock file hosts the HALT range.
    pub database_path: Option<PathBuf>,
    /// Treat halt as a no-op (this node is the writer).
    pub self_exempt: bool,
    /// Give up waiting after this long. `None` blocks indefinitely.
    pub halt_timeout: Option<Duration>,
    /// Refuse to start when the lock file cannot provide exclusive OFD locks.
    pub require_exclusive: bool,
}

impl Default for HaltConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            self_exempt: false,
            halt_timeout: None,
            require_exclusive: true,
        }
    }
}

impl HaltConfig {
    /// Config for a database path with defaults elsewhere.
    pub fn for_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load overrides from the environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `HALT_DATABASE_PATH` | `database_path` |
    /// | `HALT_SELF_EXEMPT` | `self_exempt` |
    /// | `HALT_TIMEOUT_MS` | `halt_timeout` (0 or unset = none) |
    /// | `HALT_REQUIRE_EXCLUSIVE` | `require_exclusive` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = env::var("HALT_DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(v) = env::var("HALT_SELF_EXEMPT") {
            config.self_exempt = parse_bool("HALT_SELF_EXEMPT", &v)?;
        }
        if let Ok(v) = env::var("HALT_TIMEOUT_MS") {
            let ms: u64 = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "HALT_TIMEOUT_MS",
                value: v.clone(),
            })?;
            config.halt_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Ok(v) = env::var("HALT_REQUIRE_EXCLUSIVE") {
            config.require_exclusive = parse_bool("HALT_REQUIRE_EXCLUSIVE", &v)?;
        }

        Ok(config)
    }

    /// Validate before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.is_none() {
            return Err(ConfigError::MissingDatabasePath);
        }
        if self.halt_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Path of the lock file for the configured database.
    pub fn lock_file_path(&self) -> Result<PathBuf, ConfigError> {
        self.database_path
            .as_deref()
            .map(lock_file_path)
            .ok_or(ConfigError::MissingDatabasePath)
    }
}

/// `<database>-lock`, the lock file shared by every node of a database.
pub fn lock_file_path(database_path: &Path) -> PathBuf {
    let mut name = database_path.as_os_str().to_owned();
    name.push(LOCK_FILE_SUFFIX);
    PathBuf::from(name)
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}
