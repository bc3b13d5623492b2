//! The closed reason-code sets (spec.md §7), modeled with [`caret`]'s
//! non-exhaustive string enum so an older Enforcer talking to a newer
//! Issuer (or vice versa) never fails to parse a code it doesn't
//! recognize yet — it just can't act on it specifically, the same
//! forward-compatibility property `arti`'s own wire-visible enums want.

caret::caret_enum! {
    /// The outcome of an `/api/v1/activate` call.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub enum ActivationReason as str {
        /// Activation succeeded.
        Ok => "ok",
        /// No customer owns the given product key.
        ProductKeyNotFound => "product_key_not_found",
        /// The owning customer has been revoked.
        CustomerRevoked => "customer_revoked",
        /// The customer's machine quota is already exhausted.
        MachineLimitExceeded => "machine_limit_exceeded",
        /// This fingerprint is already bound to a different product key.
        DifferentProductKey => "different_product_key",
    }
}

caret::caret_enum! {
    /// The outcome of an `/api/v1/validate` call.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub enum ValidationReason as str {
        /// The certificate is currently valid.
        Ok => "ok",
        /// No bundle has ever been activated on this host.
        NotActivated => "not_activated",
        /// The certificate document could not be parsed.
        CertificateCorrupt => "certificate_corrupt",
        /// No machine record matches the embedded machine id.
        MachineIdMissing => "machine_id_missing",
        /// The supplied fingerprint does not match the one pinned locally
        /// or the one embedded in the certificate.
        FingerprintMismatch => "fingerprint_mismatch",
        /// The certificate has no machine fingerprint field at all.
        CertFingerprintMissing => "cert_fingerprint_missing",
        /// The RSA-PSS signature did not verify.
        InvalidSignature => "invalid_signature",
        /// The keyed HMAC did not verify.
        HmacMismatch => "hmac_mismatch",
        /// The certificate's grace period has also elapsed.
        Expired => "expired",
        /// Past `valid_until` but still within the grace window.
        GracePeriod => "grace_period",
        /// The certificate has no `valid_until` field at all.
        NoExpiryDate => "no_expiry_date",
        /// The requested application service is not enabled.
        ServiceNotAllowed => "service_not_allowed",
        /// The requested Docker image is not an enabled service image.
        DockerImageNotAllowed => "docker_image_not_allowed",
        /// The machine or its owning customer has been revoked.
        Revoked => "revoked",
    }
}

caret::caret_enum! {
    /// The outcome of an `/api/v1/heartbeat` call.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub enum HeartbeatReason as str {
        /// The machine and its customer remain in good standing.
        Ok => "ok",
        /// No machine record matches this fingerprint.
        MachineNotFound => "machine_not_found",
        /// The machine itself has been revoked.
        MachineRevoked => "machine_revoked",
        /// The owning customer has been revoked.
        CustomerRevoked => "customer_revoked",
        /// Client-side only: the heartbeat request could not reach the
        /// Issuer (spec.md §4.6: "best-effort... does not by itself cause
        /// a transition"). Never produced by the Issuer itself.
        ServerCheckSkipped => "server_check_skipped",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn activation_reasons_round_trip() {
        for (code, text) in [
            (ActivationReason::Ok, "ok"),
            (ActivationReason::ProductKeyNotFound, "product_key_not_found"),
            (ActivationReason::CustomerRevoked, "customer_revoked"),
            (ActivationReason::MachineLimitExceeded, "machine_limit_exceeded"),
            (ActivationReason::DifferentProductKey, "different_product_key"),
        ] {
            assert_eq!(code.as_str(), text);
            assert_eq!(ActivationReason::from_str(text), code);
        }
    }

    #[test]
    fn validation_reasons_round_trip() {
        for (code, text) in [
            (ValidationReason::Ok, "ok"),
            (ValidationReason::Expired, "expired"),
            (ValidationReason::GracePeriod, "grace_period"),
            (ValidationReason::FingerprintMismatch, "fingerprint_mismatch"),
            (ValidationReason::ServiceNotAllowed, "service_not_allowed"),
        ] {
            assert_eq!(code.as_str(), text);
            assert_eq!(ValidationReason::from_str(text), code);
        }
    }

    #[test]
    fn unrecognized_reason_preserved_not_rejected() {
        let r = ValidationReason::from_str("future_reason_code");
        assert!(!r.is_recognized());
        assert_eq!(r.as_str(), "future_reason_code");
    }
}
