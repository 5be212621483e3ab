//! Bounded per-filter buffer of recently received messages
//!
//! Each subscribed filter gets its own FIFO sequence of inbound messages
//! capped at a configurable size; the oldest message is evicted when the
//! cap is exceeded. Only the session event loop's dispatch step writes
//! here.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rumqttc::v5::mqttbytes::QoS;
use std::collections::HashMap;
use tracing::trace;

/// Default per-filter capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// A message received on a subscribed topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub received_at: DateTime<Utc>,
}

/// Per-filter ring of most-recent messages, FIFO eviction.
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: usize,
    sequences: HashMap<String, Vec<InboundMessage>>,
}

impl MessageBuffer {
    /// Create a buffer with the given per-filter capacity.
    ///
    /// A capacity of zero is clamped to one so `record` always retains
    /// the newest message.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sequences: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message to a filter's sequence, evicting the oldest entry
    /// when the sequence would exceed the capacity.
    pub fn record(&mut self, filter: &str, message: InboundMessage) {
        let sequence = self.sequences.entry(filter.to_string()).or_default();
        if sequence.len() == self.capacity {
            sequence.remove(0);
            trace!(filter, "buffer full, evicted oldest message");
        }
        sequence.push(message);
    }

    /// Messages recorded for a filter, oldest first.
    pub fn messages(&self, filter: &str) -> Vec<InboundMessage> {
        self.sequences.get(filter).cloned().unwrap_or_default()
    }

    pub fn len(&self, filter: &str) -> usize {
        self.sequences.get(filter).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.values().all(Vec::is_empty)
    }

    /// Empty one filter's sequence.
    pub fn clear(&mut self, filter: &str) {
        self.sequences.remove(filter);
    }

    /// Empty every sequence.
    pub fn clear_all(&mut self) {
        self.sequences.clear();
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
