//! The certificate document schema (spec.md §3).
//!
//! `Certificate` is an ordinary `serde`-derived struct for ergonomic
//! construction, but the signature and HMAC preimages are *never* derived
//! from this struct's own field order or its derive-generated `Serialize`
//! impl — they go through `lic_canon_json::CanonValue`, by way of
//! `serde_json::Value`, so that the sorted-keys/no-whitespace contract
//! holds regardless of how this struct's fields happen to be declared or
//! how a future refactor reorders them. See [`crate::mint`] and
//! [`crate::verify`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tier::Tier;

/// The schema version stamped on every certificate minted by this
/// workspace.
pub const SCHEMA_VERSION: u32 = 1;

/// Algorithm names stamped into [`SecurityBlock`] (spec.md §3).
pub mod algorithm_names {
    /// Symmetric cipher used for local artifact sealing.
    pub const CIPHER: &str = "AES-256-GCM";
    /// Asymmetric signature scheme.
    pub const SIGNATURE: &str = "RSA-4096-SHA512";
    /// Keyed integrity check.
    pub const HMAC: &str = "HMAC-SHA512";
}

/// The customer block: identity fields denormalized into the certificate
/// for offline display (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerBlock {
    /// The customer's opaque id.
    pub id: String,
    /// Display name, for offline UI use.
    pub display_name: String,
    /// The product key used to claim this activation.
    pub product_key: String,
}

/// The machine block: the host this certificate is bound to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineBlock {
    /// The machine's opaque id.
    pub machine_id: String,
    /// The machine fingerprint this certificate is bound to.
    pub machine_fingerprint: String,
    /// The hostname reported at activation time.
    pub hostname: String,
    /// The name of the fingerprint algorithm used to derive
    /// `machine_fingerprint` (spec.md §4.3: `SHA3-512` over sorted,
    /// prefixed tokens).
    pub fingerprint_algorithm: String,
}

/// The validity block: when this certificate is valid, and for how long
/// past expiry it remains usable in a degraded, warned state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidityBlock {
    /// When this certificate was issued, RFC 3339 UTC.
    pub issued_at: String,
    /// When this certificate's primary validity window ends, RFC 3339 UTC.
    pub valid_until: String,
    /// Days past `valid_until` during which the Enforcer continues to run
    /// protected services while warning the user (spec.md §4.6).
    pub grace_period_days: u32,
    /// Always `"UTC"`; retained as an explicit field because spec.md §3
    /// names a timezone tag and spec.md §5 insists all comparisons are UTC
    /// — carrying the tag makes that an assertion in the document itself,
    /// not just an implementation convention.
    pub timezone: String,
}

/// The limits block: quotas this certificate's machine consumes against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitsBlock {
    /// Maximum machines the owning customer may activate.
    pub max_machines: u32,
    /// This certificate's 1-based index among the customer's activated
    /// machines at mint time (spec.md §3's "current machine index").
    pub machine_index: u32,
    /// Maximum concurrent sessions, or `None` for unlimited.
    pub concurrent_sessions: Option<u32>,
    /// Maximum API calls per rate-limit window, or `None` for unlimited.
    pub api_rate_limit: Option<u32>,
}

/// One entry in the certificate's application-service map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Whether this service is enabled for this certificate.
    pub enabled: bool,
}

/// One entry in the certificate's Docker service map (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DockerServiceEntry {
    /// Whether this containerized service is enabled.
    pub enabled: bool,
    /// Registry image name (without tag).
    pub image: String,
    /// Image tag.
    pub tag: String,
    /// Port the container listens on internally.
    pub container_port: u16,
    /// Port published on the host.
    pub host_port: u16,
    /// Whether this service must start successfully for the Enforcer to
    /// consider the activation healthy.
    pub required: bool,
}

/// The Docker block: registry access plus the per-service image map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DockerBlock {
    /// Registry base URL.
    pub registry_url: String,
    /// Registry username.
    pub username: String,
    /// Per-service image coordinates, keyed by service name.
    pub services: BTreeMap<String, DockerServiceEntry>,
}

/// The security block: hashes, the HMAC, and the HMAC's own key.
///
/// spec.md §9's Open Questions flags this directly: shipping the HMAC key
/// alongside the HMAC inside the signed document makes the HMAC a
/// checksum against accidental corruption, not an integrity MAC against a
/// capable adversary (the adversary can recompute it with the same key).
/// This is preserved as-documented; see `DESIGN.md`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityBlock {
    /// Cipher algorithm name, see [`algorithm_names::CIPHER`].
    pub cipher_algorithm: String,
    /// Signature algorithm name, see [`algorithm_names::SIGNATURE`].
    pub signature_algorithm: String,
    /// HMAC algorithm name, see [`algorithm_names::HMAC`].
    pub hmac_algorithm: String,
    /// `SHA3-512(machine_fingerprint)`, hex-encoded.
    pub fingerprint_hash: String,
    /// The HMAC value, base64-encoded.
    pub hmac: String,
    /// The HMAC key, base64-encoded, shipped alongside the tag it was
    /// computed with (see this struct's doc comment).
    pub hmac_key: String,
}

/// The full signed certificate document (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// This certificate's own opaque id.
    pub certificate_id: String,
    /// Schema version, see [`SCHEMA_VERSION`].
    pub schema_version: u32,
    /// The tier this certificate was minted under.
    pub tier: Tier,
    /// The id of the certificate this one superseded via `upgrade`, if
    /// any (spec.md §9: "a linked list by identifier, not a graph in
    /// memory").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_certificate_id: Option<String>,
    /// How many times this certificate's lineage has been upgraded.
    pub upgrade_count: u32,
    /// See [`CustomerBlock`].
    pub customer: CustomerBlock,
    /// See [`MachineBlock`].
    pub machine: MachineBlock,
    /// See [`ValidityBlock`].
    pub validity: ValidityBlock,
    /// See [`LimitsBlock`].
    pub limits: LimitsBlock,
    /// Application-service entitlements, keyed by service name.
    pub services: BTreeMap<String, ServiceEntry>,
    /// See [`DockerBlock`].
    pub docker: DockerBlock,
    /// Tier-derived feature flags.
    pub features: BTreeMap<String, bool>,
    /// See [`SecurityBlock`].
    pub security: SecurityBlock,
    /// The RSA-PSS-SHA512 signature over this document's canonical form
    /// with `signature`/`signature_timestamp` absent (spec.md invariant 1).
    /// Absent (rather than `null`) until minting completes step 7.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// When the signature was produced, RFC 3339 UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_timestamp: Option<String>,
}

impl Certificate {
    /// Serialize this certificate to its canonical JSON document, suitable
    /// for the Enforcer's plaintext `certificate.json` bundle file or wire
    /// transport.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        lic_canon_json::to_canonical_string(self)
    }

    /// Look up a Docker service entry that is both present and enabled.
    pub fn enabled_docker_service(&self, name: &str) -> Option<&DockerServiceEntry> {
        self.docker.services.get(name).filter(|s| s.enabled)
    }

    /// Return true if `image:tag` matches some enabled Docker service.
    pub fn allows_docker_image(&self, image_ref: &str) -> bool {
        self.docker
            .services
            .values()
            .any(|s| s.enabled && format!("{}:{}", s.image, s.tag) == image_ref)
    }

    /// Return true if the named application service is enabled.
    pub fn allows_service(&self, name: &str) -> bool {
        self.services.get(name).map(|s| s.enabled).unwrap_or(false)
    }
}
