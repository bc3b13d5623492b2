//! `POST /api/v1/activate` (spec.md §6).

use serde::{Deserialize, Serialize};

use crate::reason::ActivationReason;
use lic_cert::Certificate;

/// The exactly-enumerated set of recognized activation options (SPEC_FULL
/// §9: "Unknown keys should be rejected, not silently ignored"). Any field
/// not listed here fails to deserialize rather than being dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    /// The customer's product key.
    pub product_key: String,
    /// The requesting machine's fingerprint.
    pub machine_fingerprint: String,
    /// The requesting machine's hostname.
    pub hostname: String,
    /// A free-form OS description string.
    pub os_info: String,
    /// The Enforcer agent's version string.
    pub app_version: String,
}

/// Docker registry credentials, sealed under AES-256-GCM keyed by
/// `SHA-256(fingerprint)` (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DockerCredentialsEnvelope {
    /// Base64 of `nonce || ciphertext+tag` sealing a `{registry, username,
    /// token}` JSON triple.
    pub encrypted_credentials: String,
    /// Always `"AES-256-GCM"`.
    pub encryption_method: String,
    /// Always `"SHA-256(fingerprint)"`; documents how the AEAD key was
    /// derived so an Enforcer upgrade can recompute it without guessing.
    pub key_derivation: String,
}

/// The plaintext Docker credentials triple, before sealing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DockerCredentials {
    /// Registry base URL.
    pub registry: String,
    /// Registry username.
    pub username: String,
    /// Registry access token.
    pub token: String,
}

/// The activation bundle (spec.md §3, §6): everything a single activation
/// delivers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bundle {
    /// The signed certificate document.
    pub certificate: Certificate,
    /// The sealed Docker registry credentials.
    pub docker_credentials: DockerCredentialsEnvelope,
    /// The Docker Compose descriptor text.
    pub compose_file: String,
    /// The Issuer's public key, PEM-encoded.
    pub public_key: String,
}

/// Response to a successful or rejected activation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivateResponse {
    /// Whether activation succeeded.
    pub success: bool,
    /// The machine-readable reason (`ok` on success).
    pub reason: ActivationReason,
    /// Present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<Bundle>,
    /// Present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_enabled: Option<Vec<String>>,
    /// Present on `machine_limit_exceeded`: the customer's current active
    /// machine count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    /// Present on `machine_limit_exceeded`: the customer's machine quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_unknown_field() {
        let bad = r#"{"product_key":"k","machine_fingerprint":"f","hostname":"h","os_info":"o","app_version":"1","extra":"nope"}"#;
        assert!(serde_json::from_str::<ActivateRequest>(bad).is_err());
    }

    #[test]
    fn accepts_exactly_the_recognized_fields() {
        let good = r#"{"product_key":"k","machine_fingerprint":"f","hostname":"h","os_info":"o","app_version":"1"}"#;
        assert!(serde_json::from_str::<ActivateRequest>(good).is_ok());
    }
}
