//! TLS credential loading and transport construction
//!
//! Reads the device certificate, private key and root CA from disk,
//! validates that each looks like PEM, and builds the mutual-TLS
//! transport handed to the MQTT client. Credentials are immutable for
//! the lifetime of one connection attempt.

use crate::error::TlsError;
use rumqttc::Transport;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths to the mTLS credential files for one connection attempt.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub root_ca_path: Option<PathBuf>,
}

/// Loaded PEM material, ready to build a transport from.
#[derive(Debug, Clone)]
pub struct TlsMaterials {
    certificate: Vec<u8>,
    private_key: Vec<u8>,
    root_ca: Option<Vec<u8>>,
}

impl TlsMaterials {
    /// Read and sanity-check every credential file.
    ///
    /// Each failure names the offending file so the caller can surface
    /// an actionable message. Parse-level problems (key does not match
    /// certificate, expired certificate) only show up at handshake time.
    pub fn load(credentials: &Credentials) -> Result<Self, TlsError> {
        let certificate = read_pem(&credentials.certificate_path, "CERTIFICATE").map_err(
            |reason| TlsError::InvalidCertificate {
                path: credentials.certificate_path.clone(),
                reason,
            },
        )?;

        let private_key = read_pem(&credentials.private_key_path, "PRIVATE KEY").map_err(
            |reason| TlsError::InvalidKey {
                path: credentials.private_key_path.clone(),
                reason,
            },
        )?;

        let root_ca = match &credentials.root_ca_path {
            Some(path) => Some(read_pem(path, "CERTIFICATE").map_err(|reason| {
                TlsError::InvalidRootCa {
                    path: path.clone(),
                    reason,
                }
            })?),
            None => None,
        };

        debug!(
            certificate = %credentials.certificate_path.display(),
            key = %credentials.private_key_path.display(),
            root_ca = credentials.root_ca_path.is_some(),
            "loaded TLS credentials"
        );

        Ok(Self {
            certificate,
            private_key,
            root_ca,
        })
    }

    /// Build the mutual-TLS transport for the MQTT client.
    ///
    /// rustls needs explicit trust anchors to verify the broker, so the
    /// root CA must be present when client certificates are in play.
    pub fn build_transport(&self) -> Result<Transport, TlsError> {
        let ca = self.root_ca.clone().ok_or_else(|| TlsError::InvalidRootCa {
            path: PathBuf::new(),
            reason: "a root CA file is required for mutual TLS".to_string(),
        })?;

        let client_auth = Some((self.certificate.clone(), self.private_key.clone()));
        Ok(Transport::tls(ca, client_auth, None))
    }
}

/// Read a PEM file and check it contains a BEGIN block.
///
/// `expected_block` is only a hint for the error message: keys come in
/// several PEM labels (RSA/EC/PKCS#8), so any BEGIN block is accepted.
fn read_pem(path: &Path, expected_block: &str) -> Result<Vec<u8>, String> {
    let data = std::fs::read(path).map_err(|e| e.to_string())?;
    if data.is_empty() {
        return Err("file is empty".to_string());
    }
    let text = String::from_utf8_lossy(&data);
    if !text.contains("-----BEGIN") {
        return Err(format!("no PEM block found (expected a {expected_block} block)"));
    }
    Ok(data)
}
