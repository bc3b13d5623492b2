//! Certificate verification (spec.md §4.5's verifier, reversing the mint
//! algorithm's steps 6-7) and the certificate's time-validity status.

use base64ct::Encoding;
use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;

use crate::document::Certificate;
use lic_checkable::SelfSigned;

/// An error produced while verifying a certificate's signature or HMAC.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// The certificate has no `signature` field at all.
    #[error("certificate has no signature")]
    MissingSignature,
    /// A base64 field (`signature`, `security.hmac`, or `security.hmac_key`)
    /// did not decode.
    #[error("malformed base64 field: {0}")]
    MalformedBase64(String),
    /// The RSA-PSS-SHA512 signature did not verify against the embedded
    /// public key.
    #[error("invalid signature")]
    InvalidSignature,
    /// The recomputed HMAC did not match `security.hmac`.
    #[error("HMAC mismatch")]
    HmacMismatch,
}

/// Build the canonical preimage used for the RSA-PSS signature: the full
/// document with `signature`/`signature_timestamp` absent, `security`
/// present in full (spec.md invariant 1).
pub fn signature_preimage_bytes(cert: &Certificate) -> Result<Vec<u8>, serde_json::Error> {
    let mut stripped = cert.clone();
    stripped.signature = None;
    stripped.signature_timestamp = None;
    lic_canon_json::to_canonical_bytes(&stripped)
}

/// Build the canonical preimage used for the HMAC.
///
/// spec.md invariant 2 states `HMAC(key, canonical(C \ {security})) ==
/// C.security.hmac` for "any minted certificate C" — but at the moment
/// minting actually computes this value (step 6, before step 7 signs the
/// document), `signature` and `signature_timestamp` do not exist in the
/// document yet either. Reproducing the identical preimage therefore
/// requires dropping all three fields, not only `security`; this module
/// and [`crate::mint::mint`] agree on that reading so mint-then-verify is
/// a fixed point. Recorded as a resolved ambiguity in `DESIGN.md`.
pub fn hmac_preimage_bytes(cert: &Certificate) -> Result<Vec<u8>, serde_json::Error> {
    let mut stripped = cert.clone();
    stripped.signature = None;
    stripped.signature_timestamp = None;
    let value = lic_canon_json::CanonValue::from_serializable(&stripped)?;
    Ok(value.without_key("security").to_canonical_bytes())
}

/// Verify `cert`'s signature, then its HMAC, against `public_key`.
///
/// Order matters for spec.md §8's boundary behavior "a fingerprint bit-flip
/// in the certificate breaks signature verification, not HMAC first": the
/// signature covers the whole document (including the machine block), so
/// any tampering is always caught here first.
pub fn verify(cert: &Certificate, public_key: &RsaPublicKey) -> Result<(), VerifyError> {
    let signature_b64 = cert
        .signature
        .as_ref()
        .ok_or(VerifyError::MissingSignature)?;
    let signature = base64ct::Base64::decode_vec(signature_b64)
        .map_err(|_| VerifyError::MalformedBase64("signature".to_string()))?;

    let sig_preimage =
        signature_preimage_bytes(cert).map_err(|_| VerifyError::MalformedBase64("document".to_string()))?;
    if !lic_crypto::sign::verify(public_key, &sig_preimage, &signature) {
        return Err(VerifyError::InvalidSignature);
    }

    let hmac_key = base64ct::Base64::decode_vec(&cert.security.hmac_key)
        .map_err(|_| VerifyError::MalformedBase64("security.hmac_key".to_string()))?;
    let hmac_tag = base64ct::Base64::decode_vec(&cert.security.hmac)
        .map_err(|_| VerifyError::MalformedBase64("security.hmac".to_string()))?;
    let hmac_preimage =
        hmac_preimage_bytes(cert).map_err(|_| VerifyError::MalformedBase64("document".to_string()))?;
    if !lic_crypto::mac::verify(&hmac_key, &hmac_preimage, &hmac_tag) {
        return Err(VerifyError::HmacMismatch);
    }

    Ok(())
}

/// An unverified certificate paired with the public key it must be
/// checked against, implementing [`lic_checkable::SelfSigned`] so callers
/// can use the crate's `check_signature` combinator instead of calling
/// [`verify`] directly.
pub struct Unverified<'a> {
    cert: Certificate,
    public_key: &'a RsaPublicKey,
}

impl<'a> Unverified<'a> {
    /// Pair `cert` with the `public_key` it claims to be signed by.
    pub fn new(cert: Certificate, public_key: &'a RsaPublicKey) -> Self {
        Unverified { cert, public_key }
    }
}

impl<'a> SelfSigned<Certificate> for Unverified<'a> {
    type Error = VerifyError;

    fn is_well_signed(&self) -> Result<(), Self::Error> {
        verify(&self.cert, self.public_key)
    }

    fn dangerously_assume_wellsigned(self) -> Certificate {
        self.cert
    }
}

/// Where `now` falls relative to a certificate's validity window
/// (spec.md §4.6's `RUNNING`/`GRACE`/expired trichotomy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeStatus {
    /// `now < valid_until`.
    Valid,
    /// `valid_until <= now < valid_until + grace_period_days`.
    Grace,
    /// `now >= valid_until + grace_period_days`.
    Expired,
}

impl Certificate {
    /// Parse this certificate's `validity.valid_until` field.
    pub fn valid_until(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        Ok(DateTime::parse_from_rfc3339(&self.validity.valid_until)?.with_timezone(&Utc))
    }

    /// Classify `now` against this certificate's validity window plus
    /// grace period.
    pub fn time_status(&self, now: DateTime<Utc>) -> Result<TimeStatus, chrono::ParseError> {
        let valid_until = self.valid_until()?;
        if now < valid_until {
            return Ok(TimeStatus::Valid);
        }
        let grace_end = valid_until + chrono::Duration::days(self.validity.grace_period_days as i64);
        if now < grace_end {
            Ok(TimeStatus::Grace)
        } else {
            Ok(TimeStatus::Expired)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mint::{mint, MintParams};
    use crate::tier::Tier;
    use crate::types::Fingerprint;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn signed_cert() -> (Certificate, lic_crypto::KeyPair) {
        let kp = lic_crypto::KeyPair::generate().unwrap();
        let now = Utc::now();
        let params = MintParams {
            certificate_id: None,
            parent_certificate_id: None,
            upgrade_count: 0,
            tier: Tier::Basic,
            customer_id: "cust-1".to_string(),
            customer_name: "Acme".to_string(),
            product_key: "ACME-2026-ABCDEFGH-XYZ".to_string(),
            machine_id: None,
            fingerprint: Fingerprint::new("deadbeefcafef00d"),
            hostname: "acme-1".to_string(),
            issued_at: now,
            valid_until: now + Duration::days(365),
            grace_period_days: 7,
            max_machines: 3,
            machine_index: 1,
            concurrent_sessions: Some(5),
            api_rate_limit: Some(1000),
            services: vec!["frontend".to_string(), "backend".to_string()],
            docker_registry_url: "registry.licentia.example".to_string(),
            docker_username: "acme".to_string(),
            image_tag_overrides: BTreeMap::new(),
        };
        let cert = mint(params, &kp).unwrap();
        (cert, kp)
    }

    #[test]
    fn verify_succeeds_on_untampered_certificate() {
        let (cert, kp) = signed_cert();
        assert!(verify(&cert, kp.public_key()).is_ok());
    }

    #[test]
    fn fingerprint_tamper_breaks_signature_not_hmac_first() {
        let (mut cert, kp) = signed_cert();
        cert.machine.machine_fingerprint.push('!');
        assert_eq!(verify(&cert, kp.public_key()), Err(VerifyError::InvalidSignature));
    }

    #[test]
    fn wrong_public_key_is_rejected() {
        let (cert, _kp) = signed_cert();
        let other = lic_crypto::KeyPair::generate().unwrap();
        assert_eq!(verify(&cert, other.public_key()), Err(VerifyError::InvalidSignature));
    }

    #[test]
    fn hmac_mismatch_detected_when_key_tampered_but_signature_bypassed() {
        // Directly corrupt the HMAC after minting to exercise the HMAC
        // branch on its own (signature covers `security` in full, so a
        // real tamper would be caught there first -- this isolates the
        // second check).
        let (mut cert, kp) = signed_cert();
        let sig_preimage = signature_preimage_bytes(&cert).unwrap();
        cert.security.hmac = "AAAA".to_string();
        let new_sig = lic_crypto::sign::sign(kp.private_key(), &signature_preimage_bytes(&cert).unwrap()).unwrap();
        cert.signature = Some(base64ct::Base64::encode_string(&new_sig));
        let _ = sig_preimage;
        assert_eq!(verify(&cert, kp.public_key()), Err(VerifyError::HmacMismatch));
    }

    #[test]
    fn time_status_boundaries() {
        let (cert, _kp) = signed_cert();
        let valid_until = cert.valid_until().unwrap();
        assert_eq!(
            cert.time_status(valid_until - Duration::seconds(1)).unwrap(),
            TimeStatus::Valid
        );
        assert_eq!(
            cert.time_status(valid_until + Duration::seconds(1)).unwrap(),
            TimeStatus::Grace
        );
        assert_eq!(
            cert.time_status(valid_until + Duration::days(8)).unwrap(),
            TimeStatus::Expired
        );
    }

    #[test]
    fn unverified_wrapper_matches_direct_verify() {
        let (cert, kp) = signed_cert();
        let unverified = Unverified::new(cert, kp.public_key());
        assert!(unverified.check_signature().is_ok());
    }
}
