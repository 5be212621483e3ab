//! mqttprobe - MQTT test-client session engine
//!
//! Connects to an MQTT broker over mutual TLS, manages one explicitly
//! owned session per [`Session`] handle, and exposes the operations a
//! test client needs: subscribe to topic filters, publish with QoS 0/1/2,
//! and inspect messages buffered per filter.
//!
//! # Overview
//!
//! - Mutual-TLS transport from PEM credential files
//! - Explicit session lifecycle with automatic resume after interruptions
//! - Subscription registry with wildcard (`+`/`#`) topic matching
//! - Bounded per-filter buffering of inbound messages
//! - Session events drained over a channel instead of callbacks
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqttprobe::{Session, SessionConfig};
//! use rumqttc::v5::mqttbytes::QoS;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SessionConfig::new(
//!     "abc123-ats.iot.us-east-1.amazonaws.com",
//!     "/certs/device.pem.crt",
//!     "/certs/private.pem.key",
//! );
//! config.root_ca_path = Some("/certs/AmazonRootCA1.pem".into());
//!
//! let session = Session::new(config)?;
//! session.connect().await?;
//! session.subscribe("sdk/test/#", QoS::AtLeastOnce).await?;
//! session
//!     .publish("sdk/test/js", r#"{"hello":"mqtt"}"#, QoS::AtLeastOnce, false)
//!     .await?;
//!
//! for message in session.messages("sdk/test/#").await {
//!     println!("{}: {} bytes", message.topic, message.payload.len());
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod session;
pub mod topic;
pub mod transport;

pub use buffer::{InboundMessage, MessageBuffer, DEFAULT_BUFFER_CAPACITY};
pub use config::{SessionConfig, DEFAULT_PORT};
pub use error::{
    ConfigError, ConnectError, PublishError, SubscribeError, TlsError, UnsubscribeError,
};
pub use registry::{InsertOutcome, Subscription, SubscriptionRegistry};
pub use session::{ReconnectPolicy, Session, SessionEvent, SessionState};
pub use transport::Credentials;
