//! # Halt Lock
//!
//! Write-halt coordination for a replicated single-writer database. A node
//! that needs writes paused on the primary (consistent snapshot,
//! read-after-write check) takes an exclusive advisory lock on one byte of the
//! database's lock file. The primary's write gate sees that byte locked and
//! withholds commits until it is released.
//!
//! ## Protocol
//!
//! ```text
//! Replica                         <db>-lock                        Primary
//!   │ halt(handle) ──F_OFD_SETLKW──→ [72] WRLCK                      │
//!   │                               [72] ←──F_OFD_SETLK RDLCK── admit()  → Halted
//!   │  ...protected work...                                          │
//!   │ unhalt(handle) ─F_OFD_SETLK──→ [72] UNLCK                      │
//!   │                               [72] ←──F_OFD_SETLK RDLCK── admit()  → Admit
//! ```
//!
//! ## Crash Safety
//!
//! Lock ownership lives in the kernel's lock table, attached to the open
//! file description. Closing the handle, or the process dying, releases the
//! halt. Nothing is persisted and there are no heartbeats.
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Fixed offset | HALT is byte 72, length 1, on every node and version |
//! | Exclusive | At most one handle holds HALT at any instant |
//! | Handle-scoped | Two handles in one process exclude each other (Linux OFD locks) |
//! | Crash release | Closing the holding handle releases HALT |
//! | Idempotent unhalt | Unhalting an unheld lock succeeds |
//! | No fairness | Waiters are served in whatever order the kernel picks |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - byte offset registry, halt state, configuration
//! - `ports/` - inbound API traits, outbound `RangeLocker` seam
//! - `adapters/` - fcntl locker, lock file handle, capability probe
//! - `service/` - coordinator, write gate, scoped and async halts
//!
//! ## Usage
//!
//! ```ignore
//! use halt_lock::{HaltApi, HaltConfig, HaltCoordinator, HaltHold};
//!
//! let replica = HaltCoordinator::open(HaltConfig::for_database("/litefs/app.db"))?;
//! let guard = replica.halt()?;          // blocks until the primary is paused
//! take_snapshot()?;
//! guard.unhalt()?;                      // writes resume
//! ```
//!
//! ## Platform
//!
//! Unix only. Linux uses open-file-description locks. Other Unixes fall back
//! to process-scoped fcntl locks: handles within one process do not exclude
//! each other there, and closing any descriptor on the file drops all of the
//! process's locks on it.

#[cfg(not(unix))]
compile_error!("halt-lock requires Unix fcntl byte-range locks");

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{
    halt, halt_state, probe_capability, try_halt, unhalt, FcntlLocker, LockCapability,
    LockFileHandle,
};
pub use domain::{
    ByteRange, ConfigError, GateDecision, HaltConfig, HaltOutcome, HaltState, Holder, LockSlot,
    HALT_OFFSET,
};
pub use error::{LockError, LockResult};
pub use ports::{HaltApi, HaltHold, LockMode, LockScope, RangeLocker, WriteGateApi};
pub use service::{with_halt, HaltCoordinator, HaltGuard, WriteGate, WritePermit};

#[cfg(feature = "async-runtime")]
pub use service::{halt_async, halt_with_timeout, with_halt_async};
