//! Subscription registry: active topic filters and inbound dispatch
//!
//! Maps exact filter strings to their subscribed QoS and answers which
//! filters match an inbound topic. Entries are kept in subscription order
//! so overlapping filters deliver deterministically.
//!
//! Duplicate policy: subscribing a filter that is already present updates
//! its QoS in place and never creates a second entry.

use crate::topic;
use rumqttc::v5::mqttbytes::QoS;

/// Outcome of inserting a filter into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Filter was not present before
    Added,
    /// Filter was present; QoS updated in place
    Updated { previous: QoS },
}

/// One active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub filter: String,
    pub qos: QoS,
}

/// In-memory set of active topic filters, keyed by exact filter string.
///
/// Entries only exist while the session is Connected or Interrupted; the
/// session clears the registry on disconnect.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter, updating QoS in place when it already exists.
    ///
    /// The filter must already be validated by the operation layer.
    pub fn insert(&mut self, filter: &str, qos: QoS) -> InsertOutcome {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.filter == filter) {
            let previous = entry.qos;
            entry.qos = qos;
            return InsertOutcome::Updated { previous };
        }
        self.entries.push(Subscription {
            filter: filter.to_string(),
            qos,
        });
        InsertOutcome::Added
    }

    /// Remove a filter, returning its QoS, or `None` if absent.
    pub fn remove(&mut self, filter: &str) -> Option<QoS> {
        let position = self.entries.iter().position(|e| e.filter == filter)?;
        Some(self.entries.remove(position).qos)
    }

    pub fn contains(&self, filter: &str) -> bool {
        self.entries.iter().any(|e| e.filter == filter)
    }

    /// All filters matching an inbound topic, in subscription order.
    ///
    /// Deliver-to-all policy: every matching filter receives the message.
    pub fn matching_filters(&self, inbound_topic: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| topic::matches(&e.filter, inbound_topic))
            .map(|e| e.filter.clone())
            .collect()
    }

    /// Snapshot of all active subscriptions, in subscription order.
    ///
    /// Used for automatic resubscription after a connection resumes.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.insert("sdk/test/js", QoS::AtMostOnce),
            InsertOutcome::Added
        );
        assert!(registry.contains("sdk/test/js"));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove("sdk/test/js"), Some(QoS::AtMostOnce));
        assert!(registry.is_empty());
        assert_eq!(registry.remove("sdk/test/js"), None);
    }

    #[test]
    fn test_duplicate_insert_updates_qos_in_place() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert("sdk/test/js", QoS::AtMostOnce);
        assert_eq!(
            registry.insert("sdk/test/js", QoS::AtLeastOnce),
            InsertOutcome::Updated {
                previous: QoS::AtMostOnce
            }
        );

        // Never silently duplicates
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.subscriptions()[0].qos, QoS::AtLeastOnce);
    }

    #[test]
    fn test_matching_filters_delivers_to_all() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert("sdk/test/js", QoS::AtMostOnce);
        registry.insert("sdk/+/js", QoS::AtLeastOnce);
        registry.insert("sdk/#", QoS::AtMostOnce);
        registry.insert("other/topic", QoS::AtMostOnce);

        let matched = registry.matching_filters("sdk/test/js");
        assert_eq!(matched, vec!["sdk/test/js", "sdk/+/js", "sdk/#"]);

        let matched = registry.matching_filters("sdk/test/python");
        assert_eq!(matched, vec!["sdk/#"]);

        assert!(registry.matching_filters("unrelated").is_empty());
    }

    #[test]
    fn test_subscriptions_snapshot_preserves_order_and_qos() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert("a/#", QoS::AtLeastOnce);
        registry.insert("b/+", QoS::ExactlyOnce);

        let subs = registry.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].filter, "a/#");
        assert_eq!(subs[0].qos, QoS::AtLeastOnce);
        assert_eq!(subs[1].filter, "b/+");
        assert_eq!(subs[1].qos, QoS::ExactlyOnce);
    }

    #[test]
    fn test_clear() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert("a/#", QoS::AtMostOnce);
        registry.insert("b/#", QoS::AtMostOnce);
        registry.clear();
        assert!(registry.is_empty());
    }
}
