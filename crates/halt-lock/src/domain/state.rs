//! # Halt Lock State
//!
//! The halt state is never stored by this crate. It is read back from the
//! kernel lock table on demand, which is what makes crash release free.
//!
//! ```text
//!            halt()                      unhalt()
//! [Unlocked] ──────→ [Held(handle)] ──────────────→ [Unlocked]
//!                          │
//!                          └── handle closed / process exit ──→ [Unlocked]
//! ```
//!
//! There is no held-by-many state for the exclusive HALT lock.

use std::fmt;

/// Who holds a range, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// An open file description; the kernel does not report an owner pid.
    OpenFileDescription,
    /// A process-scoped lock held by this pid.
    Process(i32),
}

impl Holder {
    /// Map the `l_pid` reported by `F_GETLK`/`F_OFD_GETLK`.
    ///
    /// OFD locks report `-1` since they belong to no single process.
    pub fn from_pid(pid: i32) -> Self {
        if pid <= 0 {
            Holder::OpenFileDescription
        } else {
            Holder::Process(pid)
        }
    }
}

/// Observed state of the HALT range from the point of view of one handle.
///
/// Locks held through the querying handle itself never conflict with it, so a
/// handle that holds HALT observes `Unlocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltState {
    /// No other handle holds a conflicting lock.
    Unlocked,
    /// Another handle holds the range exclusively (a halt is in effect).
    Halted { holder: Holder },
    /// Another handle holds the range shared (a write is being admitted).
    Admitting { holder: Holder },
}

impl HaltState {
    /// True when writes must be withheld.
    pub fn is_halted(&self) -> bool {
        matches!(self, HaltState::Halted { .. })
    }
}

impl fmt::Display for HaltState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltState::Unlocked => write!(f, "unlocked"),
            HaltState::Halted { holder } => write!(f, "halted ({:?})", holder),
            HaltState::Admitting { holder } => write!(f, "admitting writes ({:?})", holder),
        }
    }
}

/// How a successful halt call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltOutcome {
    /// The exclusive lock was granted by the kernel.
    Acquired,
    /// The node is configured self-exempt; no lock was taken.
    Exempt,
}

/// Result of asking the write gate to admit a write.
#[derive(Debug)]
pub enum GateDecision<P> {
    /// Commit may proceed while the permit is alive.
    Admit(P),
    /// A halt is in effect; the write must be withheld.
    Halted,
}

impl<P> GateDecision<P> {
    /// True when the write was refused.
    pub fn is_halted(&self) -> bool {
        matches!(self, GateDecision::Halted)
    }

    /// The permit, if the write was admitted.
    pub fn permit(self) -> Option<P> {
        match self {
            GateDecision::Admit(permit) => Some(permit),
            GateDecision::Halted => None,
        }
    }
}

/// Why a held HALT lock went back to `Unlocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Explicit unhalt on the holding handle.
    Unhalt,
    /// The holding handle was closed (including process exit).
    HandleClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_from_ofd_pid() {
        assert_eq!(Holder::from_pid(-1), Holder::OpenFileDescription);
        assert_eq!(Holder::from_pid(0), Holder::OpenFileDescription);
        assert_eq!(Holder::from_pid(4242), Holder::Process(4242));
    }

    #[test]
    fn test_only_exclusive_holder_halts() {
        let holder = Holder::OpenFileDescription;
        assert!(HaltState::Halted { holder }.is_halted());
        assert!(!HaltState::Admitting { holder }.is_halted());
        assert!(!HaltState::Unlocked.is_halted());
    }
}
