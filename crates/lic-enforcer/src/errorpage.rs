//! The static page served on the protected port once the machine has
//! transitioned to `TERMINATED` (spec.md §7's "user-visible failure":
//! protected services are down, so something has to answer that port
//! with an explanation instead of a connection refusal).

use lic_wire::ValidationReason;

/// A human-readable sentence for each [`ValidationReason`] that can drive
/// a termination, for display on the error page. Falls back to the raw
/// reason code for anything not in this closed set (an older Enforcer
/// talking to a newer Issuer may see a code it doesn't recognize yet).
fn human_readable(reason: &ValidationReason) -> String {
    match *reason {
        ValidationReason::NotActivated => "This installation has not been activated.".to_string(),
        ValidationReason::CertificateCorrupt => "The license certificate is corrupt.".to_string(),
        ValidationReason::MachineIdMissing => "No machine record matches this installation.".to_string(),
        ValidationReason::FingerprintMismatch => "This license is bound to different hardware.".to_string(),
        ValidationReason::CertFingerprintMissing => "The license certificate is missing its machine binding.".to_string(),
        ValidationReason::InvalidSignature => "The license certificate's signature is invalid.".to_string(),
        ValidationReason::HmacMismatch => "The license certificate failed an integrity check.".to_string(),
        ValidationReason::Expired => "This license has expired.".to_string(),
        ValidationReason::ServiceNotAllowed => "This license does not include the requested service.".to_string(),
        ValidationReason::DockerImageNotAllowed => "This license does not include the requested application.".to_string(),
        ValidationReason::Revoked => "This license has been revoked.".to_string(),
        ValidationReason::Ok | ValidationReason::GracePeriod | ValidationReason::NoExpiryDate => {
            "This license is no longer valid.".to_string()
        }
        ref other => format!("This license is no longer valid ({}).", other.as_str()),
    }
}

/// Render the static HTML page shown on the protected port once
/// services have been stopped.
pub fn render(reason: &ValidationReason) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head><meta charset=\"utf-8\"><title>Service unavailable</title></head>\n\
<body>\n\
<h1>Service unavailable</h1>\n\
<p>{}</p>\n\
<p><small>reason: {}</small></p>\n\
</body>\n\
</html>\n",
        human_readable(reason),
        reason.as_str()
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_a_sentence_for_expiry() {
        let page = render(&ValidationReason::Expired);
        assert!(page.contains("This license has expired."));
        assert!(page.contains("reason: expired"));
    }

    #[test]
    fn unrecognized_reason_still_renders_something() {
        let page = render(&ValidationReason::from_str("future_reason_code"));
        assert!(page.contains("future_reason_code"));
    }
}
