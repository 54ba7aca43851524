//! Driving Ports (API - Inbound)

use crate::domain::{GateDecision, HaltOutcome, HaltState};
use crate::error::LockResult;

/// Halt coordination API used by a node that needs writes paused.
///
/// Halting is a blocking call; async callers go through
/// `service::blocking` instead of calling this on an executor thread.
pub trait HaltApi {
    /// Guard returned while the halt is in effect.
    type Guard;

    /// Block until HALT is held, or return immediately when self-exempt.
    fn halt(&self) -> LockResult<Self::Guard>;

    /// Take HALT only if nobody else holds it.
    fn try_halt(&self) -> LockResult<Option<Self::Guard>>;

    /// Current HALT state as seen from this node's handle.
    fn state(&self) -> LockResult<HaltState>;
}

/// Guard-side half of the halt API.
pub trait HaltHold {
    /// How the halt was satisfied.
    fn outcome(&self) -> HaltOutcome;

    /// Release the halt, reporting failures to the caller.
    fn unhalt(self) -> LockResult<()>;
}

/// Write admission API used by the primary's write path.
pub trait WriteGateApi {
    /// Permit kept alive for the duration of one write.
    type Permit;

    /// Admit a write unless a halt is in effect. Never blocks.
    fn admit(&self) -> LockResult<GateDecision<Self::Permit>>;

    /// True when a halt is currently in effect.
    fn is_halted(&self) -> LockResult<bool>;
}
