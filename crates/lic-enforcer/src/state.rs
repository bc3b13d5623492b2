//! The Enforcer's local activation state machine (spec.md §4.6):
//! `UNACTIVATED → VALIDATING → RUNNING → (GRACE | INVALID) → TERMINATED`.
//!
//! The signature, HMAC, fingerprint, expiry, and entitlement checks that
//! gate every transition are folded into one [`local_check`] call, built
//! on [`lic_cert::verify::Unverified`] (so the signature check goes
//! through [`lic_checkable::SelfSigned::check_signature`] rather than a
//! direct call to `lic_cert::verify::verify`) and
//! [`lic_cert::Certificate::time_status`]. The reason codes returned are
//! the same closed set `lic-issuer`'s `validate` engine method produces,
//! so an Enforcer's local verdict and an Issuer's server-side verdict are
//! always expressed the same way.

use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;

use lic_cert::verify::{TimeStatus, Unverified};
use lic_cert::Certificate;
use lic_checkable::SelfSigned;
use lic_wire::{HeartbeatReason, HeartbeatResponse, ValidationReason};

/// Where the Enforcer's state machine currently sits (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnforcerState {
    /// No bundle has ever been activated on this host.
    Unactivated,
    /// A bundle is present; the startup check has not yet completed.
    Validating,
    /// The certificate is fully valid; protected services run normally.
    Running,
    /// Past `valid_until` but still inside the grace window; protected
    /// services keep running, degraded and warned.
    Grace,
    /// The certificate (or the heartbeat's verdict) failed; protected
    /// services must stop.
    Invalid,
    /// Protected services have been stopped and the error page is live.
    Terminated,
}

impl EnforcerState {
    /// Whether protected services should be running in this state.
    pub fn serves_protected_traffic(&self) -> bool {
        matches!(self, EnforcerState::Running | EnforcerState::Grace)
    }
}

/// The outcome of one [`local_check`] pass: the same closed reason set
/// [`lic_wire::ValidationReason`] enumerates, plus the raw time status
/// when a validity window was actually evaluated.
#[derive(Clone, Debug)]
pub struct LocalCheckResult {
    /// The machine-readable reason for this verdict.
    pub reason: ValidationReason,
    /// The certificate's time status, if checking got that far.
    pub time_status: Option<TimeStatus>,
}

impl LocalCheckResult {
    fn rejected(reason: ValidationReason) -> Self {
        LocalCheckResult {
            reason,
            time_status: None,
        }
    }
}

/// Run the full local verification sequence spec.md §4.6 gates `RUNNING`
/// on: pinned fingerprint match, signature, HMAC, time validity, then
/// (if requested) service and Docker image entitlement.
///
/// Order matters the same way it does in [`lic_cert::verify::verify`]:
/// the fingerprint is checked first since a substituted certificate with
/// a *valid* signature for a *different* machine should read as a
/// mismatch, not a signature failure.
pub fn local_check(
    cert: &Certificate,
    public_key: &RsaPublicKey,
    local_fingerprint: &str,
    required_service: Option<&str>,
    required_docker_image: Option<&str>,
    now: DateTime<Utc>,
) -> LocalCheckResult {
    if cert.machine.machine_fingerprint != local_fingerprint {
        return LocalCheckResult::rejected(ValidationReason::FingerprintMismatch);
    }

    let unverified = Unverified::new(cert.clone(), public_key);
    if let Err(e) = unverified.is_well_signed() {
        let reason = match e {
            lic_cert::verify::VerifyError::MissingSignature | lic_cert::verify::VerifyError::MalformedBase64(_) => {
                ValidationReason::CertificateCorrupt
            }
            lic_cert::verify::VerifyError::InvalidSignature => ValidationReason::InvalidSignature,
            lic_cert::verify::VerifyError::HmacMismatch => ValidationReason::HmacMismatch,
        };
        return LocalCheckResult::rejected(reason);
    }

    let Ok(time_status) = cert.time_status(now) else {
        return LocalCheckResult::rejected(ValidationReason::NoExpiryDate);
    };
    if time_status == TimeStatus::Expired {
        return LocalCheckResult {
            reason: ValidationReason::Expired,
            time_status: Some(time_status),
        };
    }

    if let Some(service) = required_service {
        if !cert.allows_service(service) {
            return LocalCheckResult {
                reason: ValidationReason::ServiceNotAllowed,
                time_status: Some(time_status),
            };
        }
    }
    if let Some(image) = required_docker_image {
        if !cert.allows_docker_image(image) {
            return LocalCheckResult {
                reason: ValidationReason::DockerImageNotAllowed,
                time_status: Some(time_status),
            };
        }
    }

    let reason = if time_status == TimeStatus::Grace {
        ValidationReason::GracePeriod
    } else {
        ValidationReason::Ok
    };
    LocalCheckResult {
        reason,
        time_status: Some(time_status),
    }
}

/// Compute the state a [`local_check`] result drives the machine to.
///
/// `local_check` already folds fingerprint, signature, HMAC, expiry, and
/// entitlement into one reason, so the mapping back to a state is a
/// simple three-way split: `ok` runs, `grace_period` runs degraded,
/// anything else is invalid (spec.md §4.6's "fingerprint mismatch at any
/// revalidation" and "failing signature/fingerprint on revalidation"
/// both land here, since `local_check` itself already detected them).
pub fn next_state(result: &LocalCheckResult) -> EnforcerState {
    match result.reason {
        ValidationReason::Ok => EnforcerState::Running,
        ValidationReason::GracePeriod => EnforcerState::Grace,
        _ => EnforcerState::Invalid,
    }
}

/// Fold a heartbeat's verdict into the current state (spec.md §4.6:
/// "on heartbeat revoked_* ... GRACE -> INVALID"). A heartbeat can only
/// ever push the machine toward `Invalid` — revocation is server-side
/// state `local_check` has no way to see — never pull it back out.
pub fn next_state_after_heartbeat(current: EnforcerState, response: &HeartbeatResponse) -> EnforcerState {
    match response.reason {
        HeartbeatReason::MachineRevoked | HeartbeatReason::CustomerRevoked => EnforcerState::Invalid,
        _ => current,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn signed_cert(fingerprint: &str) -> (Certificate, lic_crypto::KeyPair) {
        let kp = lic_crypto::KeyPair::generate().unwrap();
        let now = Utc::now();
        let params = lic_cert::MintParams {
            certificate_id: None,
            parent_certificate_id: None,
            upgrade_count: 0,
            tier: lic_cert::Tier::Basic,
            customer_id: "cust-1".to_string(),
            customer_name: "Acme".to_string(),
            product_key: "ACME-2026-ABCDEFGH-XYZ".to_string(),
            machine_id: None,
            fingerprint: lic_cert::Fingerprint::new(fingerprint),
            hostname: "box1".to_string(),
            issued_at: now,
            valid_until: now + Duration::days(365),
            grace_period_days: 7,
            max_machines: 3,
            machine_index: 1,
            concurrent_sessions: Some(5),
            api_rate_limit: Some(1000),
            services: vec!["frontend".to_string()],
            docker_registry_url: "registry.licentia.example".to_string(),
            docker_username: "acme".to_string(),
            image_tag_overrides: BTreeMap::new(),
        };
        let cert = lic_cert::mint(params, &kp).unwrap();
        (cert, kp)
    }

    #[test]
    fn valid_certificate_drives_running() {
        let (cert, kp) = signed_cert("fp-1");
        let result = local_check(&cert, kp.public_key(), "fp-1", None, None, Utc::now());
        assert_eq!(result.reason, ValidationReason::Ok);
        assert_eq!(next_state(&result), EnforcerState::Running);
    }

    #[test]
    fn fingerprint_mismatch_is_invalid_even_with_perfect_signature() {
        let (cert, kp) = signed_cert("fp-1");
        let result = local_check(&cert, kp.public_key(), "different-fp", None, None, Utc::now());
        assert_eq!(result.reason, ValidationReason::FingerprintMismatch);
        assert_eq!(next_state(&result), EnforcerState::Invalid);
    }

    #[test]
    fn past_valid_until_within_grace_drives_grace() {
        let (cert, kp) = signed_cert("fp-1");
        let grace_moment = cert.valid_until().unwrap() + Duration::days(1);
        let result = local_check(&cert, kp.public_key(), "fp-1", None, None, grace_moment);
        assert_eq!(result.reason, ValidationReason::GracePeriod);
        assert_eq!(next_state(&result), EnforcerState::Grace);
    }

    #[test]
    fn past_grace_window_drives_invalid() {
        let (cert, kp) = signed_cert("fp-1");
        let expired_moment = cert.valid_until().unwrap() + Duration::days(30);
        let result = local_check(&cert, kp.public_key(), "fp-1", None, None, expired_moment);
        assert_eq!(result.reason, ValidationReason::Expired);
        assert_eq!(next_state(&result), EnforcerState::Invalid);
    }

    #[test]
    fn unrequested_service_rejects_even_when_otherwise_valid() {
        let (cert, kp) = signed_cert("fp-1");
        let result = local_check(&cert, kp.public_key(), "fp-1", Some("analytics"), None, Utc::now());
        assert_eq!(result.reason, ValidationReason::ServiceNotAllowed);
    }

    #[test]
    fn heartbeat_revocation_forces_invalid_out_of_grace() {
        let response = HeartbeatResponse {
            valid: false,
            reason: HeartbeatReason::CustomerRevoked,
            customer_name: None,
            tier: None,
        };
        assert_eq!(
            next_state_after_heartbeat(EnforcerState::Grace, &response),
            EnforcerState::Invalid
        );
    }

    #[test]
    fn healthy_heartbeat_leaves_state_unchanged() {
        let response = HeartbeatResponse {
            valid: true,
            reason: HeartbeatReason::Ok,
            customer_name: Some("Acme".to_string()),
            tier: Some("basic".to_string()),
        };
        assert_eq!(
            next_state_after_heartbeat(EnforcerState::Running, &response),
            EnforcerState::Running
        );
    }
}
