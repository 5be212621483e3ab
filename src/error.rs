//! Error taxonomy for the MQTT test-client engine
//!
//! One enum per failure family so callers can match on a stable kind and
//! surface an actionable message. Transport failures during an active
//! session are handled by the reconnection supervisor and never reach
//! these types; everything here is surfaced synchronously to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// TLS credential and handshake failures.
///
/// Credential errors are fatal and never retried automatically.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid certificate {path}: {reason}")]
    InvalidCertificate { path: PathBuf, reason: String },

    #[error("invalid private key {path}: {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    #[error("invalid root CA {path}: {reason}")]
    InvalidRootCa { path: PathBuf, reason: String },

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("endpoint unreachable: {0}")]
    EndpointUnreachable(String),
}

/// Failures of an explicit `connect` call.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("broker rejected credentials: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no CONNACK received within the connect timeout")]
    Timeout,

    #[error("connect cancelled by disconnect")]
    Cancelled,

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Failures of an explicit `subscribe` call.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("not connected: session state is {state}")]
    NotConnected { state: String },

    #[error("invalid topic filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("broker subscribe failed: {0}")]
    Broker(String),
}

/// Failures of an explicit `unsubscribe` call.
#[derive(Debug, Error)]
pub enum UnsubscribeError {
    #[error("not connected: session state is {state}")]
    NotConnected { state: String },

    #[error("no active subscription for filter {filter:?}")]
    NotSubscribed { filter: String },

    #[error("broker unsubscribe failed: {0}")]
    Broker(String),
}

/// Failures of an explicit `publish` call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected: session state is {state}")]
    NotConnected { state: String },

    #[error("invalid publish topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("no acknowledgment from broker within {timeout_secs}s")]
    AckTimeout { timeout_secs: u64 },

    #[error("broker publish failed: {0}")]
    Broker(String),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}
