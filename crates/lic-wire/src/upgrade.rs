//! `POST /api/v1/upgrade` (spec.md §6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::activate::Bundle;

/// The exactly-enumerated set of recognized upgrade options (SPEC_FULL
/// §9). All fields besides `machine_fingerprint` are optional — an
/// upgrade request names only the parameters it wants to change.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpgradeRequest {
    /// The machine to upgrade, identified by its current fingerprint.
    pub machine_fingerprint: String,
    /// A new tier to move to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tier: Option<String>,
    /// Days to add to the certificate's current `valid_until` (spec.md
    /// §4.4: "days add to the previous valid-until rather than the
    /// current wall clock").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_days: Option<u32>,
    /// A new machine quota for the owning customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_machine_limit: Option<u32>,
    /// Service names to add to the certificate's existing enabled set
    /// (spec.md §4.4: "services become union").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_services: Option<Vec<String>>,
    /// New image tags, keyed by service name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_image_tags: Option<BTreeMap<String, String>>,
}

/// Response to an upgrade request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpgradeResponse {
    /// Whether the upgrade succeeded.
    pub success: bool,
    /// The tier the machine was on before this call.
    pub old_tier: String,
    /// The tier the machine is on after this call.
    pub new_tier: String,
    /// Present iff `success`: the refreshed bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<Bundle>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_unknown_field() {
        let bad = r#"{"machine_fingerprint":"f","bogus_field":true}"#;
        assert!(serde_json::from_str::<UpgradeRequest>(bad).is_err());
    }

    #[test]
    fn all_optional_fields_may_be_omitted() {
        let minimal = r#"{"machine_fingerprint":"f"}"#;
        let req: UpgradeRequest = serde_json::from_str(minimal).unwrap();
        assert!(req.new_tier.is_none());
        assert!(req.additional_days.is_none());
    }
}
