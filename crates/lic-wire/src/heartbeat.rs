//! `POST /api/v1/heartbeat` (spec.md §6): a lightweight liveness/
//! revocation check, safe to call at high frequency.

use serde::{Deserialize, Serialize};

use crate::reason::HeartbeatReason;

/// A heartbeat request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// The requesting machine's fingerprint.
    pub machine_fingerprint: String,
    /// An optional service name, echoed back in telemetry only — the
    /// heartbeat does not gate on service entitlement (that's
    /// `/validate`'s job).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// Response to a heartbeat request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    /// Whether the machine and its customer remain in good standing.
    pub valid: bool,
    /// The machine-readable reason.
    pub reason: HeartbeatReason,
    /// Present when `valid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Present when `valid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}
