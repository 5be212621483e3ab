//! Publish and subscribe acknowledgment correlation
//!
//! `rumqttc` assigns packet ids internally, so a QoS 1/2 publish learns
//! its pkid only when the outgoing PUBLISH event surfaces. Waiters are
//! registered in submission order and bound to a pkid on the outgoing
//! event; PUBACK/PUBCOMP then completes the bound waiter.
//!
//! SUBSCRIBE correlation works the same way: the filter is queued at
//! submission, bound to a pkid on the outgoing SUBSCRIBE event, and
//! looked up again when the SUBACK arrives so refused return codes can
//! be attributed to the right filter.
//!
//! Submission of each kind is serialized by the session, so
//! registration order equals outgoing order.

use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use tracing::debug;

/// Ack waiters for in-flight QoS 1/2 publishes.
#[derive(Debug, Default)]
pub struct AckWaiters {
    next_token: u64,
    unassigned: VecDeque<(u64, oneshot::Sender<()>)>,
    assigned: HashMap<u16, oneshot::Sender<()>>,
}

impl AckWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next submitted publish. The token
    /// allows cancellation if the publish never reaches the broker.
    pub fn register(&mut self) -> (u64, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token;
        self.next_token += 1;
        self.unassigned.push_back((token, tx));
        (token, rx)
    }

    /// Remove a waiter whose publish failed before leaving the socket,
    /// so it can never bind to a later publish's pkid.
    pub fn cancel(&mut self, token: u64) {
        self.unassigned.retain(|(t, _)| *t != token);
    }

    /// Bind the oldest unassigned waiter to the pkid of a publish that
    /// just left the socket. pkid 0 is a QoS 0 publish and has no ack.
    pub fn publish_sent(&mut self, pkid: u16) {
        if pkid == 0 {
            return;
        }
        if let Some((_, tx)) = self.unassigned.pop_front() {
            self.assigned.insert(pkid, tx);
        }
    }

    /// Complete the waiter for an acknowledged pkid (PUBACK or PUBCOMP).
    pub fn acknowledged(&mut self, pkid: u16) {
        if let Some(tx) = self.assigned.remove(&pkid) {
            // Receiver may have timed out already; nothing to do then
            let _ = tx.send(());
        } else {
            debug!(pkid, "ack for unknown pkid (likely a timed-out publish)");
        }
    }

    /// Drop every waiter; their receivers observe the closed channel.
    /// Called on disconnect and interruption.
    pub fn fail_all(&mut self) {
        self.unassigned.clear();
        self.assigned.clear();
    }

    pub fn pending(&self) -> usize {
        self.unassigned.len() + self.assigned.len()
    }
}

/// Filter names for in-flight SUBSCRIBE requests, keyed by pkid once
/// the outgoing event surfaces.
#[derive(Debug, Default)]
pub struct SubscribeWaiters {
    unassigned: VecDeque<String>,
    assigned: HashMap<u16, String>,
}

impl SubscribeWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the filter of the next submitted SUBSCRIBE.
    pub fn register(&mut self, filter: &str) {
        self.unassigned.push_back(filter.to_string());
    }

    /// Drop the most recently queued filter after a failed submission,
    /// so it can never bind to a later request's pkid.
    pub fn cancel_last(&mut self) {
        self.unassigned.pop_back();
    }

    /// Bind the oldest queued filter to the pkid of a SUBSCRIBE that
    /// just left the socket.
    pub fn subscribe_sent(&mut self, pkid: u16) {
        if let Some(filter) = self.unassigned.pop_front() {
            self.assigned.insert(pkid, filter);
        }
    }

    /// Resolve a SUBACK's pkid back to the filter it was sent for.
    pub fn acked(&mut self, pkid: u16) -> Option<String> {
        let filter = self.assigned.remove(&pkid);
        if filter.is_none() {
            debug!(pkid, "SUBACK for unknown pkid");
        }
        filter
    }

    /// Drop every queued and bound filter. Called on disconnect and
    /// interruption alongside failing the publish waiters.
    pub fn clear(&mut self) {
        self.unassigned.clear();
        self.assigned.clear();
    }

    pub fn pending(&self) -> usize {
        self.unassigned.len() + self.assigned.len()
    }
}
