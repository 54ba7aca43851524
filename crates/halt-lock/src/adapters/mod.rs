//! # Adapters Module
//!
//! Contains adapter implementations for the halt lock.
//!
//! ## Modules
//!
//! - `fcntl`: `RangeLocker` over fcntl record locks, plus the HALT primitive
//! - `lock_file`: lock file handle lifecycle
//! - `capability`: startup check that locks are exclusive between handles

pub mod capability;
pub mod fcntl;
pub mod lock_file;

pub use capability::{probe_capability, probe_with, LockCapability};
pub use fcntl::{halt, halt_state, try_halt, unhalt, FcntlLocker};
pub use lock_file::{LockFileHandle, LOCK_FILE_MODE};
