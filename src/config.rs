//! Session configuration
//!
//! Everything `connect` needs: broker endpoint, mTLS credential paths,
//! timeouts, buffer capacity and the reconnection policy. Loadable from
//! TOML with serde defaults, validated before use.

use crate::error::ConfigError;
use crate::session::reconnect::ReconnectPolicy;
use crate::transport::Credentials;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default MQTT-over-TLS port.
pub const DEFAULT_PORT: u16 = 8883;

/// Configuration for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Broker hostname (e.g. `xxx-ats.iot.us-east-1.amazonaws.com`)
    pub endpoint: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Device certificate (PEM)
    pub certificate_path: PathBuf,
    /// Device private key (PEM)
    pub private_key_path: PathBuf,
    /// Root CA (PEM); required by the transport for mutual TLS
    #[serde(default)]
    pub root_ca_path: Option<PathBuf>,
    /// Client identifier; generated when absent
    #[serde(default)]
    pub client_id: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// How long `connect` waits for a CONNACK
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How long a QoS 1/2 publish waits for its acknowledgment
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
    /// Per-filter message buffer capacity
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Backoff policy for resuming an interrupted session
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_ack_timeout_secs() -> u64 {
    10
}

fn default_buffer_capacity() -> usize {
    crate::buffer::DEFAULT_BUFFER_CAPACITY
}

impl SessionConfig {
    /// Minimal config with defaults for everything optional.
    pub fn new(
        endpoint: impl Into<String>,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            port: DEFAULT_PORT,
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
            root_ca_path: None,
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
            buffer_capacity: default_buffer_capacity(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Load and validate a config from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field-level invariants not expressible in the type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation("endpoint must not be empty".into()));
        }
        if self.certificate_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "certificate_path must not be empty".into(),
            ));
        }
        if self.private_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "private_key_path must not be empty".into(),
            ));
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::Validation(
                "keep_alive_secs must be greater than 0".into(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.ack_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "ack_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Validation(
                "buffer_capacity must be greater than 0".into(),
            ));
        }
        if let Some(client_id) = &self.client_id {
            if client_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "client_id must not be blank when set".into(),
                ));
            }
        }
        self.reconnect.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }

    /// Credential file paths for the transport layer.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            certificate_path: self.certificate_path.clone(),
            private_key_path: self.private_key_path.clone(),
            root_ca_path: self.root_ca_path.clone(),
        }
    }

    /// Configured client id, or a generated `probe-<uuid>` one.
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("probe-{}", uuid::Uuid::new_v4().simple()))
    }
}
