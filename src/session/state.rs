//! Pure session state machine and keep-alive accounting
//!
//! The state watch channel owned by the session is the single source of
//! "connected" truth; every transition flows through
//! [`next_state`] so the diagram stays in one place:
//!
//! `Disconnected -> Connecting -> Connected -> { Interrupted -> Connected
//!  | Disconnecting -> Disconnected }`

use tracing::{info, warn};

/// Lifecycle state of the one session owned by a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Interrupted,
    Disconnecting,
}

impl SessionState {
    /// Publish/subscribe/unsubscribe operations are only accepted here.
    pub fn allows_operations(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Subscription registry entries may only exist in these states;
    /// an interrupted session keeps its intent for resubscription.
    pub fn retains_subscriptions(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Interrupted)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Interrupted => "Interrupted",
            SessionState::Disconnecting => "Disconnecting",
        };
        f.write_str(name)
    }
}

/// Session-level happenings that drive state transitions.
#[derive(Debug, Clone)]
pub enum SessionTransition {
    ConnectRequested,
    ConnAckAccepted,
    /// Initial connect failed before or at CONNACK
    ConnectFailed(String),
    /// Transport error or tripped keep-alive while connected
    Interrupted(String),
    DisconnectRequested,
    DisconnectComplete,
    /// Reconnection gave up (shutdown or attempts exhausted)
    ReconnectAborted(String),
}

/// Compute the successor state for a transition (pure function).
///
/// Transitions that make no sense from the current state leave it
/// unchanged; the caller logs at its own discretion.
pub fn next_state(current: SessionState, transition: &SessionTransition) -> SessionState {
    use SessionState as S;
    use SessionTransition as T;

    match (current, transition) {
        (S::Disconnected, T::ConnectRequested) => S::Connecting,
        (S::Connecting, T::ConnAckAccepted) => S::Connected,
        (S::Interrupted, T::ConnAckAccepted) => {
            info!("session resumed after interruption");
            S::Connected
        }
        (S::Connecting, T::ConnectFailed(reason)) => {
            warn!(reason = %reason, "connect failed");
            S::Disconnected
        }
        (S::Connected, T::Interrupted(reason)) => {
            warn!(reason = %reason, "session interrupted");
            S::Interrupted
        }
        (S::Connected | S::Interrupted | S::Connecting, T::DisconnectRequested) => S::Disconnecting,
        (_, T::DisconnectComplete) => S::Disconnected,
        (_, T::ReconnectAborted(reason)) => {
            warn!(reason = %reason, "reconnection aborted, session disconnected");
            S::Disconnected
        }
        (state, _) => state,
    }
}

/// How many consecutive missed pings force an interruption.
pub const MAX_MISSED_PINGS: u32 = 3;

/// Tracks keep-alive health across transport hiccups.
///
/// The protocol client reports a missed ping as a poll error when the
/// next PINGREQ comes due with the previous one still unacknowledged,
/// so misses arrive one at a time; the budget counts consecutive misses
/// and trips on the third. Any PINGRESP clears the budget.
#[derive(Debug, Default)]
pub struct KeepAliveTracker {
    outstanding: u32,
    misses: u32,
}

impl KeepAliveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ping going out.
    pub fn ping_sent(&mut self) {
        self.outstanding += 1;
    }

    /// Record a ping acknowledgment from the broker; the miss budget
    /// starts over.
    pub fn ping_acknowledged(&mut self) {
        self.outstanding = 0;
        self.misses = 0;
    }

    /// Record a missed ping; returns true when the miss budget is
    /// exhausted and the session must transition to Interrupted.
    pub fn ping_missed(&mut self) -> bool {
        self.outstanding = 0;
        self.misses += 1;
        self.misses >= MAX_MISSED_PINGS
    }

    /// Reset after an explicit (re)connect; pings from the old
    /// connection no longer count.
    pub fn reset(&mut self) {
        self.outstanding = 0;
        self.misses = 0;
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }
}
