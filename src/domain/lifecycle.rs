//! Lifecycle states for registered services.
//!
//! Every component managed by the registry moves through a fixed state
//! machine. The registry is the only writer of these states.

use std::fmt;

/// Lifecycle state of a registered service.
///
/// Legal transitions:
/// `Uninitialized → Initializing → Ready → Stopping → Stopped`,
/// plus `any state → Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Registered but not yet initialized.
    Uninitialized,
    /// `initialize()` is in flight.
    Initializing,
    /// Initialized (and possibly started); safe for dependents to use.
    Ready,
    /// `stop()` is in flight.
    Stopping,
    /// Stopped cleanly.
    Stopped,
    /// A lifecycle call failed; the service is out of rotation.
    Error,
}

impl ServiceState {
    /// Check whether a transition to `next` is legal from this state.
    pub fn can_transition(self, next: ServiceState) -> bool {
        use ServiceState::*;
        match (self, next) {
            (_, Error) => true,
            (Uninitialized, Initializing) => true,
            (Initializing, Ready) => true,
            (Ready, Stopping) => true,
            (Stopping, Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
            ServiceState::Error => "error",
        };
        write!(f, "{}", s)
    }
}
