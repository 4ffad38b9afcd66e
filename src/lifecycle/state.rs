//! Server lifecycle state machine.
//!
//! # States
//! - Starting: sources loading, socket not yet bound
//! - Listening: accepting connections
//! - Draining: socket closed, in-flight connections finishing
//! - Stopped: terminal
//!
//! # State Transitions
//! ```text
//! Starting → Listening: listener bound
//! Starting | Listening → Draining: termination signal
//! Draining → Stopped: connections closed or grace period elapsed
//! ```
//!
//! # Design Decisions
//! - Stored as a u8 so transitions are a single compare-and-swap
//! - Variant order is transition order; states only move forward

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Listening = 1,
    Draining = 2,
    Stopped = 3,
}

impl LifecycleState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Listening,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_round_trip_and_order() {
        for state in [
            LifecycleState::Starting,
            LifecycleState::Listening,
            LifecycleState::Draining,
            LifecycleState::Stopped,
        ] {
            assert_eq!(LifecycleState::from_u8(state as u8), state);
        }
        assert!(LifecycleState::Starting < LifecycleState::Listening);
        assert!(LifecycleState::Draining < LifecycleState::Stopped);
    }
}
