//! `POST /api/v1/validate` (spec.md §6).

use serde::{Deserialize, Serialize};

use crate::reason::ValidationReason;
use lic_cert::Certificate;

/// A validation request. Unlike [`crate::activate::ActivateRequest`] and
/// [`crate::upgrade::UpgradeRequest`], spec.md does not enumerate this as
/// a closed option bag in its Dynamic-option-bags design note, so unknown
/// fields are ignored rather than rejected here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// The certificate document to check.
    pub certificate: Certificate,
    /// The requesting machine's freshly computed fingerprint.
    pub machine_fingerprint: String,
    /// An application service name to additionally require be enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// A `<image>:<tag>` reference to additionally require be an enabled
    /// Docker service image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
}

/// Response to a validation request. Always HTTP 200, even when
/// `valid: false` (spec.md §7: "never a non-2xx for a merely invalid
/// license").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the certificate currently grants access.
    pub valid: bool,
    /// The machine-readable reason.
    pub reason: ValidationReason,
    /// Present when `valid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Present when `valid`: RFC 3339 `valid_until`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Present when `valid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_enabled: Option<Vec<String>>,
}
