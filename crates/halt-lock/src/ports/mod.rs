//! Ports (Hexagonal Architecture)
//!
//! - `inbound`: what callers drive (halt coordination, write admission)
//! - `outbound`: what this crate drives (the kernel's range-lock table)

pub mod inbound;
pub mod outbound;

pub use inbound::{HaltApi, HaltHold, WriteGateApi};
pub use outbound::{Conflict, LockMode, LockScope, RangeLocker};
