//! Decoding of the `SECRET_KEY` handed to a node by the panel.
//!
//! The key is standard base64 of a JSON object holding the node's TLS
//! material and the public key used to verify panel JWTs. Nothing here
//! validates the certificates or keys, it only unpacks them.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum SecretDecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    node_cert_pem: String,
    node_key_pem: String,
    ca_cert_pem: String,
    jwt_public_key: String,
}

impl NodePayload {
    pub fn node_cert_pem(&self) -> &str {
        &self.node_cert_pem
    }

    pub fn node_key_pem(&self) -> &str {
        &self.node_key_pem
    }

    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    pub fn jwt_public_key(&self) -> &str {
        &self.jwt_public_key
    }
}

// Key material stays out of logs and panic messages
impl fmt::Debug for NodePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePayload").finish_non_exhaustive()
    }
}

impl FromStr for NodePayload {
    type Err = SecretDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = STANDARD.decode(s.trim().as_bytes())?;
        let payload: NodePayload = serde_json::from_slice(&decoded)?;
        Ok(payload)
    }
}

/// Turns the raw `SECRET_KEY` value into a [`NodePayload`].
pub trait SecretKeyDecoder {
    fn decode(&self, raw: &str) -> Result<NodePayload, SecretDecodeError>;
}

/// The panel's encoding: base64 wrapped JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64JsonDecoder;

impl SecretKeyDecoder for Base64JsonDecoder {
    fn decode(&self, raw: &str) -> Result<NodePayload, SecretDecodeError> {
        raw.parse()
    }
}

impl<F> SecretKeyDecoder for F
where
    F: Fn(&str) -> Result<NodePayload, SecretDecodeError>,
{
    fn decode(&self, raw: &str) -> Result<NodePayload, SecretDecodeError> {
        self(raw)
    }
}
