//! # Halt Runtime
//!
//! Operator tooling for the halt lock. The `haltctl` binary wraps these
//! commands; they are exposed as a library so they can be tested directly.

pub mod commands;
pub mod logging;

pub use commands::{exec, hold, probe, resolve_config, status};
