//! MQTT session: state machine, operation layer and event loop
//!
//! A [`Session`] is an explicitly owned handle; there is no process-wide
//! connection state. Independent sessions can coexist, each owning at
//! most one active broker connection supervised by a background task.

use crate::buffer::InboundMessage;

pub mod acks;
pub mod client;
pub mod reconnect;
pub mod router;
pub mod state;

pub use client::Session;
pub use reconnect::{ReconnectDecision, ReconnectPolicy};
pub use state::{KeepAliveTracker, SessionState};

/// Notifications emitted by a session, drained by the surrounding shell
/// instead of listener-style callbacks.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// CONNACK accepted; session is Connected
    Connected,
    /// Transport lost or keep-alive exhausted; reconnection may follow
    Interrupted { reason: String },
    /// Reconnected after an interruption; subscriptions reinstated
    Resumed,
    /// Session reached Disconnected (explicit or after giving up)
    Disconnected,
    /// Message received on a subscribed topic
    Message(InboundMessage),
    /// Broker refused a SUBSCRIBE via its SUBACK return code; the
    /// filter has been removed from the registry
    SubscriptionRejected { filter: String, reason: String },
}
