//! Certificate minting (spec.md §4.5): the authoritative 8-step algorithm
//! turning a set of parameters into a signed, HMAC-protected certificate.
//!
//! This module only knows how to mint a document from already-decided
//! parameters (tier, quotas, the machine this binds to); it has no opinion
//! about *where those parameters came from* — `lic-issuer` computes fresh
//! vs. additive validity windows, quota checks, and service-set unions,
//! then hands the result here. That split mirrors spec.md's own framing:
//! "Given customer, machine fingerprint, hostname, product key, tier,
//! validity days, machine quota" as inputs to a pure minting step.

use base64ct::Encoding;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::document::{
    algorithm_names, Certificate, CustomerBlock, DockerBlock, DockerServiceEntry, LimitsBlock,
    MachineBlock, SecurityBlock, ServiceEntry, ValidityBlock, SCHEMA_VERSION,
};
use crate::tier::{self, Tier};
use crate::types::Fingerprint;

/// Inputs to [`mint`]. See the module doc for the division of
/// responsibility between this crate and `lic-issuer`.
pub struct MintParams {
    /// Reuse this certificate id rather than generating a fresh one.
    /// Always `None` in practice (certificates always get a fresh id);
    /// kept for test determinism.
    pub certificate_id: Option<String>,
    /// The prior certificate in this machine's upgrade chain, if any.
    pub parent_certificate_id: Option<String>,
    /// How many times this lineage has been upgraded so far; the minted
    /// certificate's `upgrade_count` is this value unchanged for a fresh
    /// activation, or the prior value plus one for an upgrade.
    pub upgrade_count: u32,
    /// The tier this certificate is minted under.
    pub tier: Tier,
    /// The owning customer's opaque id.
    pub customer_id: String,
    /// The owning customer's display name.
    pub customer_name: String,
    /// The product key used to claim this activation.
    pub product_key: String,
    /// Reuse this machine id (an upgrade keeps the same machine row);
    /// `None` generates a fresh one (a first activation).
    pub machine_id: Option<String>,
    /// The machine fingerprint this certificate is bound to.
    pub fingerprint: Fingerprint,
    /// The hostname reported at activation time.
    pub hostname: String,
    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,
    /// End of the primary validity window.
    pub valid_until: DateTime<Utc>,
    /// Grace period length, in days.
    pub grace_period_days: u32,
    /// The owning customer's machine quota.
    pub max_machines: u32,
    /// This certificate's 1-based index among the customer's machines.
    pub machine_index: u32,
    /// Maximum concurrent sessions, or `None` for unlimited.
    pub concurrent_sessions: Option<u32>,
    /// Maximum API calls per window, or `None` for unlimited.
    pub api_rate_limit: Option<u32>,
    /// The final, already-unioned set of enabled service names.
    pub services: Vec<String>,
    /// Docker registry base URL.
    pub docker_registry_url: String,
    /// Docker registry username.
    pub docker_username: String,
    /// Per-service tag overrides (spec.md `upgrade`'s `new_image_tags`),
    /// keyed by service name.
    pub image_tag_overrides: BTreeMap<String, String>,
}

/// Build the application-service map: every known service name (plus any
/// caller-named service not in the known set, so `upgrade`'s
/// `additional_services` can introduce arbitrary names) marked enabled iff
/// present in `enabled_services`.
fn build_service_map(enabled_services: &[String]) -> BTreeMap<String, ServiceEntry> {
    let mut names: Vec<String> = tier::ALL_SERVICES.iter().map(|s| s.to_string()).collect();
    for s in enabled_services {
        if !names.contains(s) {
            names.push(s.clone());
        }
    }
    names
        .into_iter()
        .map(|name| {
            let enabled = enabled_services.contains(&name);
            (name, ServiceEntry { enabled })
        })
        .collect()
}

/// Build the Docker block from the same enabled-service set, applying any
/// per-service tag overrides.
fn build_docker_block(
    registry_url: String,
    username: String,
    enabled_services: &[String],
    tag_overrides: &BTreeMap<String, String>,
) -> DockerBlock {
    let mut names: Vec<String> = tier::ALL_SERVICES.iter().map(|s| s.to_string()).collect();
    for s in enabled_services {
        if !names.contains(s) {
            names.push(s.clone());
        }
    }
    let services = names
        .into_iter()
        .map(|name| {
            let (image, default_tag, container_port, host_port, required) =
                tier::docker_defaults(&name);
            let tag = tag_overrides
                .get(&name)
                .cloned()
                .unwrap_or_else(|| default_tag.to_string());
            let enabled = enabled_services.contains(&name);
            (
                name,
                DockerServiceEntry {
                    enabled,
                    image: image.to_string(),
                    tag,
                    container_port,
                    host_port,
                    required,
                },
            )
        })
        .collect();
    DockerBlock {
        registry_url,
        username,
        services,
    }
}

/// Mint and sign a certificate from `params`, using `keypair` for the
/// RSA-PSS-SHA512 signature (spec.md §4.5, steps 1-8).
pub fn mint(params: MintParams, keypair: &lic_crypto::KeyPair) -> lic_error::Result<Certificate> {
    // Steps 1-5: assign identity, build the non-security blocks.
    let certificate_id = params
        .certificate_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let machine_id = params
        .machine_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let services = build_service_map(&params.services);
    let docker = build_docker_block(
        params.docker_registry_url,
        params.docker_username,
        &params.services,
        &params.image_tag_overrides,
    );
    let features = tier::feature_flags(&params.tier);

    let fingerprint_hash = lic_crypto::hash::sha3_512_hex(params.fingerprint.as_str().as_bytes());

    // Security block, minus hmac/hmac_key, which depend on the rest of
    // the document being finalized first.
    let mut security = SecurityBlock {
        cipher_algorithm: algorithm_names::CIPHER.to_string(),
        signature_algorithm: algorithm_names::SIGNATURE.to_string(),
        hmac_algorithm: algorithm_names::HMAC.to_string(),
        fingerprint_hash,
        hmac: String::new(),
        hmac_key: String::new(),
    };

    let mut cert = Certificate {
        certificate_id,
        schema_version: SCHEMA_VERSION,
        tier: params.tier,
        parent_certificate_id: params.parent_certificate_id,
        upgrade_count: params.upgrade_count,
        customer: CustomerBlock {
            id: params.customer_id,
            display_name: params.customer_name,
            product_key: params.product_key,
        },
        machine: MachineBlock {
            machine_id,
            machine_fingerprint: params.fingerprint.as_str().to_string(),
            hostname: params.hostname,
            fingerprint_algorithm: "SHA3-512".to_string(),
        },
        validity: ValidityBlock {
            issued_at: params.issued_at.to_rfc3339(),
            valid_until: params.valid_until.to_rfc3339(),
            grace_period_days: params.grace_period_days,
            timezone: "UTC".to_string(),
        },
        limits: LimitsBlock {
            max_machines: params.max_machines,
            machine_index: params.machine_index,
            concurrent_sessions: params.concurrent_sessions,
            api_rate_limit: params.api_rate_limit,
        },
        services,
        docker,
        features,
        security: security.clone(),
        signature: None,
        signature_timestamp: None,
    };

    // Step 6: HMAC over the canonical document with `security` (and, since
    // neither exists yet at this point in a genuine mint, `signature`/
    // `signature_timestamp`) absent. See DESIGN.md for why the verifier
    // mirrors this exact field set rather than only dropping `security`.
    let hmac_key = lic_crypto::mac::generate_key();
    let hmac_preimage = crate::verify::hmac_preimage_bytes(&cert)?;
    let hmac_tag = lic_crypto::mac::compute(&hmac_key, &hmac_preimage)?;

    security.hmac = base64ct::Base64::encode_string(&hmac_tag);
    security.hmac_key = base64ct::Base64::encode_string(&hmac_key);
    cert.security = security;

    // Step 7: sign the canonical document with `security` now filled in,
    // `signature`/`signature_timestamp` still absent.
    let sig_preimage = crate::verify::signature_preimage_bytes(&cert)?;
    let signature = lic_crypto::sign::sign(keypair.private_key(), &sig_preimage)?;

    // Step 8: attach signature and timestamp.
    cert.signature = Some(base64ct::Base64::encode_string(&signature));
    cert.signature_timestamp = Some(Utc::now().to_rfc3339());

    Ok(cert)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::verify::verify;
    use chrono::Duration;

    fn test_keypair() -> lic_crypto::KeyPair {
        lic_crypto::KeyPair::generate().expect("keypair")
    }

    fn base_params() -> MintParams {
        let now = Utc::now();
        MintParams {
            certificate_id: None,
            parent_certificate_id: None,
            upgrade_count: 0,
            tier: Tier::Pro,
            customer_id: "cust-1".to_string(),
            customer_name: "Acme".to_string(),
            product_key: "ACME-2026-ABCDEFGH-XYZ".to_string(),
            machine_id: None,
            fingerprint: Fingerprint::new("deadbeefcafef00d"),
            hostname: "acme-1".to_string(),
            issued_at: now,
            valid_until: now + Duration::days(365),
            grace_period_days: 7,
            max_machines: 10,
            machine_index: 1,
            concurrent_sessions: Some(20),
            api_rate_limit: Some(5000),
            services: vec!["frontend".to_string(), "backend".to_string(), "analytics".to_string()],
            docker_registry_url: "registry.licentia.example".to_string(),
            docker_username: "acme".to_string(),
            image_tag_overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn minted_certificate_verifies() {
        let kp = test_keypair();
        let cert = mint(base_params(), &kp).unwrap();
        assert!(verify(&cert, kp.public_key()).is_ok());
    }

    #[test]
    fn enabled_services_match_requested_set() {
        let kp = test_keypair();
        let cert = mint(base_params(), &kp).unwrap();
        assert!(cert.allows_service("frontend"));
        assert!(cert.allows_service("backend"));
        assert!(cert.allows_service("analytics"));
        assert!(!cert.allows_service("monitoring"));
    }

    #[test]
    fn docker_image_reference_matches_enabled_service() {
        let kp = test_keypair();
        let cert = mint(base_params(), &kp).unwrap();
        assert!(cert.allows_docker_image("licentia/backend:latest"));
        assert!(!cert.allows_docker_image("licentia/monitoring:latest"));
    }

    #[test]
    fn image_tag_override_is_applied() {
        let kp = test_keypair();
        let mut params = base_params();
        params
            .image_tag_overrides
            .insert("backend".to_string(), "v2".to_string());
        let cert = mint(params, &kp).unwrap();
        assert!(cert.allows_docker_image("licentia/backend:v2"));
    }

    #[test]
    fn fingerprint_hash_is_present_and_deterministic() {
        let kp = test_keypair();
        let cert = mint(base_params(), &kp).unwrap();
        let expected = lic_crypto::hash::sha3_512_hex(b"deadbeefcafef00d");
        assert_eq!(cert.security.fingerprint_hash, expected);
    }
}
