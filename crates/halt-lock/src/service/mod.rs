//! # Service Module
//!
//! Application services over the HALT primitive.
//!
//! ## Modules
//!
//! - `coordinator`: `HaltCoordinator` and its RAII `HaltGuard`
//! - `gate`: `WriteGate`, the primary's admission check
//! - `scoped`: `with_halt` helpers (open, halt, run, unhalt, close)
//! - `blocking`: async offload of the blocking halt, with deadlines

#[cfg(feature = "async-runtime")]
pub mod blocking;
pub mod coordinator;
pub mod gate;
pub mod scoped;


#[cfg(feature = "async-runtime")]
pub use blocking::{halt_async, halt_async_with, halt_with_timeout, halt_with_timeout_with};
pub use coordinator::{HaltCoordinator, HaltGuard};
pub use gate::{WriteGate, WritePermit};
#[cfg(feature = "async-runtime")]
pub use scoped::with_halt_async;
pub use scoped::with_halt;
