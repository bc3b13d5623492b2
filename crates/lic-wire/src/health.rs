//! `GET /health` (spec.md §6).

use serde::{Deserialize, Serialize};

/// The Issuer's liveness response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` if the process is able to respond at all.
    pub status: String,
    /// The running Issuer binary's version string.
    pub version: String,
    /// RFC 3339 UTC timestamp of this response.
    pub timestamp: String,
}
