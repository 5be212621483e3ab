//! Pure routing of MQTT protocol events
//!
//! Flattens `rumqttc` v5 events into the small set of routes the session
//! event loop acts on. No I/O and no state in here, so the routing table
//! is testable with hand-built packets.

use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, SubscribeReasonCode};
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Routing decision for one MQTT event.
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Broker accepted the connection
    ConnAckAccepted { session_present: bool },
    /// Broker refused the connection
    ConnAckRejected { reason: String, auth_failure: bool },
    /// Inbound PUBLISH on a subscribed topic
    MessageReceived {
        topic: String,
        payload: bytes::Bytes,
        qos: rumqttc::v5::mqttbytes::QoS,
        retain: bool,
    },
    /// QoS 1 publish acknowledged
    PublishAcked { pkid: u16 },
    /// QoS 2 publish completed
    PublishCompleted { pkid: u16 },
    /// Our PUBLISH left the socket; pkid now known for ack correlation
    PublishSent { pkid: u16 },
    /// Our SUBSCRIBE left the socket; pkid now known for SUBACK correlation
    SubscribeSent { pkid: u16 },
    /// SUBACK arrived; `failure` carries the reason when the broker
    /// refused the subscription
    SubscriptionAcked { pkid: u16, failure: Option<String> },
    /// Keep-alive ping left the socket
    PingSent,
    /// Keep-alive ping acknowledged by the broker
    PingAcknowledged,
    /// Broker-initiated DISCONNECT
    Disconnected,
    /// Anything else (PubRec/PubRel plumbing, outgoing acks, ...)
    Infrastructure,
}

/// Map a protocol event to its route (pure function).
pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(connack) => match connack.code {
                ConnectReturnCode::Success => EventRoute::ConnAckAccepted {
                    session_present: connack.session_present,
                },
                code => EventRoute::ConnAckRejected {
                    reason: format!("{code:?}"),
                    auth_failure: is_auth_failure(code),
                },
            },
            Packet::Publish(publish) => EventRoute::MessageReceived {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.clone(),
                qos: publish.qos,
                retain: publish.retain,
            },
            Packet::PubAck(puback) => EventRoute::PublishAcked { pkid: puback.pkid },
            Packet::PubComp(pubcomp) => EventRoute::PublishCompleted {
                pkid: pubcomp.pkid,
            },
            Packet::SubAck(suback) => EventRoute::SubscriptionAcked {
                pkid: suback.pkid,
                failure: suback_failure(&suback.return_codes),
            },
            Packet::PingResp(_) => EventRoute::PingAcknowledged,
            Packet::Disconnect(_) => EventRoute::Disconnected,
            _ => EventRoute::Infrastructure,
        },
        Event::Outgoing(outgoing) => match outgoing {
            Outgoing::Publish(pkid) => EventRoute::PublishSent { pkid: *pkid },
            Outgoing::Subscribe(pkid) => EventRoute::SubscribeSent { pkid: *pkid },
            Outgoing::PingReq => EventRoute::PingSent,
            _ => EventRoute::Infrastructure,
        },
    }
}

/// First refused reason code in a SUBACK, if any. Success codes echo the
/// granted QoS; anything else means the broker refused that filter.
fn suback_failure(return_codes: &[SubscribeReasonCode]) -> Option<String> {
    return_codes.iter().find_map(|code| match code {
        SubscribeReasonCode::Success(_) => None,
        refused => Some(format!("{refused:?}")),
    })
}

/// Whether a CONNACK refusal is a credential problem rather than a
/// transient network/broker condition.
fn is_auth_failure(code: ConnectReturnCode) -> bool {
    matches!(
        code,
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rumqttc::v5::mqttbytes::v5::{ConnAck, Disconnect, DisconnectReasonCode, Publish, SubAck};
    use rumqttc::v5::mqttbytes::QoS;

    fn connack(code: ConnectReturnCode) -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code,
            properties: None,
        }))
    }

    #[test]
    fn test_connack_success_routes_accepted() {
        assert!(matches!(
            route_event(&connack(ConnectReturnCode::Success)),
            EventRoute::ConnAckAccepted {
                session_present: false
            }
        ));
    }

    #[test]
    fn test_connack_not_authorized_is_auth_failure() {
        match route_event(&connack(ConnectReturnCode::NotAuthorized)) {
            EventRoute::ConnAckRejected {
                auth_failure,
                reason,
            } => {
                assert!(auth_failure);
                assert!(reason.contains("NotAuthorized"));
            }
            other => panic!("expected ConnAckRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_connack_service_unavailable_is_not_auth_failure() {
        match route_event(&connack(ConnectReturnCode::ServiceUnavailable)) {
            EventRoute::ConnAckRejected { auth_failure, .. } => assert!(!auth_failure),
            other => panic!("expected ConnAckRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_publish_routes_message_received() {
        let event = Event::Incoming(Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: true,
            topic: Bytes::from("sdk/test/js"),
            pkid: 7,
            payload: Bytes::from(r#"{"a":1}"#),
            properties: None,
        }));

        match route_event(&event) {
            EventRoute::MessageReceived {
                topic,
                payload,
                qos,
                retain,
            } => {
                assert_eq!(topic, "sdk/test/js");
                assert_eq!(payload, Bytes::from(r#"{"a":1}"#));
                assert_eq!(qos, QoS::AtLeastOnce);
                assert!(retain);
            }
            other => panic!("expected MessageReceived, got {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_routes_disconnected() {
        let event = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: None,
        }));
        assert!(matches!(route_event(&event), EventRoute::Disconnected));
    }

    #[test]
    fn test_outgoing_publish_carries_pkid() {
        let event = Event::Outgoing(Outgoing::Publish(42));
        assert!(matches!(
            route_event(&event),
            EventRoute::PublishSent { pkid: 42 }
        ));
    }

    #[test]
    fn test_ping_events() {
        assert!(matches!(
            route_event(&Event::Outgoing(Outgoing::PingReq)),
            EventRoute::PingSent
        ));
    }

    #[test]
    fn test_outgoing_subscribe_carries_pkid() {
        let event = Event::Outgoing(Outgoing::Subscribe(3));
        assert!(matches!(
            route_event(&event),
            EventRoute::SubscribeSent { pkid: 3 }
        ));
    }

    #[test]
    fn test_suback_success_has_no_failure() {
        let event = Event::Incoming(Packet::SubAck(SubAck {
            pkid: 9,
            return_codes: vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)],
            properties: None,
        }));
        match route_event(&event) {
            EventRoute::SubscriptionAcked { pkid, failure } => {
                assert_eq!(pkid, 9);
                assert!(failure.is_none());
            }
            other => panic!("expected SubscriptionAcked, got {other:?}"),
        }
    }

    #[test]
    fn test_suback_refusal_carries_reason() {
        let event = Event::Incoming(Packet::SubAck(SubAck {
            pkid: 9,
            return_codes: vec![SubscribeReasonCode::NotAuthorized],
            properties: None,
        }));
        match route_event(&event) {
            EventRoute::SubscriptionAcked { pkid, failure } => {
                assert_eq!(pkid, 9);
                assert_eq!(failure.as_deref(), Some("NotAuthorized"));
            }
            other => panic!("expected SubscriptionAcked, got {other:?}"),
        }
    }

    #[test]
    fn test_other_outgoing_is_infrastructure() {
        assert!(matches!(
            route_event(&Event::Outgoing(Outgoing::Unsubscribe(3))),
            EventRoute::Infrastructure
        ));
    }
}
