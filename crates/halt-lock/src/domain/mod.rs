//! # Domain Module
//!
//! Pure domain types for the halt lock: no syscalls live here.
//!
//! ## Modules
//!
//! - `registry`: fixed byte offsets of every logical lock
//! - `state`: halt state as observed from the kernel lock table
//! - `config`: caller policy (self-exemption, timeouts)

pub mod config;
pub mod registry;
pub mod state;

pub use config::{lock_file_path, ConfigError, HaltConfig, LOCK_FILE_SUFFIX};
pub use registry::{ByteRange, LockSlot, ReadSlot, HALT_OFFSET, PROBE_OFFSET, READ_SLOT_COUNT};
pub use state::{GateDecision, HaltOutcome, HaltState, Holder, ReleaseReason};
