//! Configuration loading and validation tests
//!
//! Tests observable outcomes of loading, defaulting and validating the
//! session configuration, not TOML parsing internals.

use mqttprobe::{ConfigError, SessionConfig};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
endpoint = "abc123-ats.iot.us-east-1.amazonaws.com"
certificate_path = "/certs/device.pem.crt"
private_key_path = "/certs/private.pem.key"
root_ca_path = "/certs/AmazonRootCA1.pem"
client_id = "bench-client"
keep_alive_secs = 30

[reconnect]
initial_delay_ms = 100
max_delay_ms = 5000
max_attempts = 8
"#
    )
    .unwrap();

    let config = SessionConfig::from_toml_file(temp_file.path()).unwrap();

    assert_eq!(config.endpoint, "abc123-ats.iot.us-east-1.amazonaws.com");
    assert_eq!(config.client_id.as_deref(), Some("bench-client"));
    assert_eq!(config.keep_alive_secs, 30);
    assert_eq!(config.reconnect.initial_delay_ms, 100);
    assert_eq!(config.reconnect.max_delay_ms, 5000);
    assert_eq!(config.reconnect.max_attempts, Some(8));
}

#[test]
fn test_config_applies_defaults_for_omitted_fields() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
endpoint = "broker.example.com"
certificate_path = "/certs/device.pem.crt"
private_key_path = "/certs/private.pem.key"
"#
    )
    .unwrap();

    let config = SessionConfig::from_toml_file(temp_file.path()).unwrap();

    assert_eq!(config.port, 8883);
    assert_eq!(config.keep_alive_secs, 60);
    assert_eq!(config.connect_timeout_secs, 30);
    assert_eq!(config.ack_timeout_secs, 10);
    assert_eq!(config.buffer_capacity, 100);
    assert!(config.client_id.is_none());
    assert!(config.root_ca_path.is_none());
    // Unlimited reconnection attempts by default
    assert_eq!(config.reconnect.max_attempts, None);
}

#[test]
fn test_config_rejects_missing_required_fields() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, r#"endpoint = "broker.example.com""#).unwrap();

    let result = SessionConfig::from_toml_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_rejects_invalid_values() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
endpoint = "broker.example.com"
certificate_path = "/certs/device.pem.crt"
private_key_path = "/certs/private.pem.key"
keep_alive_secs = 0
"#
    )
    .unwrap();

    let result = SessionConfig::from_toml_file(temp_file.path());
    match result {
        Err(ConfigError::Validation(message)) => {
            assert!(message.contains("keep_alive_secs"));
        }
        other => panic!("expected Validation error, got {other:?}"),
    }
}

#[test]
fn test_config_missing_file_reports_path() {
    let result = SessionConfig::from_toml_file("/nonexistent/probe.toml");
    match result {
        Err(ConfigError::Io { path, .. }) => {
            assert_eq!(path, std::path::PathBuf::from("/nonexistent/probe.toml"));
        }
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = SessionConfig::new("broker.example.com", "/c.pem", "/k.pem");
    config.client_id = Some("round-trip".to_string());
    config.reconnect.max_attempts = Some(3);

    let serialized = toml::to_string(&config).unwrap();
    let restored: SessionConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(restored, config);
}
