//! Deterministic fingerprint derivation from collected hardware tokens
//! (spec.md §4.3).

use rand_core::{OsRng, RngCore};

use crate::probes::HardwareProbes;

/// An error produced while deriving a fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    /// Fewer than three tokens were collected from the host, and a pinned
    /// fingerprint file already exists — spec.md §4.3 forbids falling
    /// back to a random token in that case, since doing so would silently
    /// produce a fingerprint that can never match the pin again.
    #[error("insufficient hardware tokens collected and a fingerprint is already pinned")]
    InsufficientProbesAfterPin,
}

/// Minimum number of tokens required before the random fallback is
/// skipped (spec.md §4.3: "if fewer than three tokens collected...").
const MIN_TOKENS_BEFORE_FALLBACK: usize = 3;

/// Derive a machine fingerprint from `probes`.
///
/// `pin_exists` must reflect whether a pinned fingerprint file is already
/// present on disk *before* this call — the random fallback is only
/// permitted on a genuinely first run.
///
/// Returns the lowercase-hex `SHA3-512` digest of the sorted, pipe-joined
/// token list.
pub fn derive_fingerprint(
    probes: &dyn HardwareProbes,
    pin_exists: bool,
) -> Result<String, DeriveError> {
    let mut tokens = Vec::new();
    if let Some(h) = probes.hostname() {
        tokens.push(format!("hostname:{h}"));
    }
    if let Some(s) = probes.system() {
        tokens.push(format!("system:{s}"));
    }
    if let Some(m) = probes.machine_arch() {
        tokens.push(format!("machine:{m}"));
    }
    tokens.extend(probes.os_specific_tokens());

    if tokens.len() < MIN_TOKENS_BEFORE_FALLBACK {
        if pin_exists {
            return Err(DeriveError::InsufficientProbesAfterPin);
        }
        let mut random_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut random_bytes);
        tokens.push(format!("random:{}", hex::encode(random_bytes)));
    }

    // Canonicalization: sort alphabetically before joining (spec.md §4.3),
    // the same "sorted, prefixed, no-disk-serial" variant spec.md §9's
    // Open Questions resolves the source's three contradictory derivations
    // to.
    tokens.sort();
    let joined = tokens.join("|");
    Ok(lic_crypto::hash::sha3_512_hex(joined.as_bytes()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::probes::FixedProbes;

    fn probes() -> FixedProbes {
        FixedProbes {
            hostname: Some("box1".to_string()),
            system: Some("Linux".to_string()),
            machine_arch: Some("x86_64".to_string()),
            os_specific_tokens: vec!["machine_id:abc123".to_string()],
        }
    }

    #[test]
    fn deterministic_on_same_probe_output() {
        let p = probes();
        let a = derive_fingerprint(&p, true).unwrap();
        let b = derive_fingerprint(&p, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn order_of_probe_collection_does_not_matter() {
        // Tokens are sorted before hashing, so two hosts whose probes
        // happen to enumerate in different orders still agree, as long as
        // the token *set* is the same.
        let p1 = FixedProbes {
            hostname: Some("box1".to_string()),
            system: Some("Linux".to_string()),
            machine_arch: Some("x86_64".to_string()),
            os_specific_tokens: vec!["machine_id:abc123".to_string(), "product_uuid:xyz".to_string()],
        };
        let p2 = FixedProbes {
            hostname: Some("box1".to_string()),
            system: Some("Linux".to_string()),
            machine_arch: Some("x86_64".to_string()),
            os_specific_tokens: vec!["product_uuid:xyz".to_string(), "machine_id:abc123".to_string()],
        };
        assert_eq!(
            derive_fingerprint(&p1, true).unwrap(),
            derive_fingerprint(&p2, true).unwrap()
        );
    }

    #[test]
    fn different_hosts_produce_different_fingerprints() {
        let p1 = probes();
        let mut p2 = probes();
        p2.hostname = Some("box2".to_string());
        assert_ne!(
            derive_fingerprint(&p1, true).unwrap(),
            derive_fingerprint(&p2, true).unwrap()
        );
    }

    #[test]
    fn insufficient_probes_without_pin_falls_back_to_random() {
        let empty = FixedProbes::default();
        let result = derive_fingerprint(&empty, false);
        assert!(result.is_ok());
    }

    #[test]
    fn insufficient_probes_with_existing_pin_aborts() {
        let empty = FixedProbes::default();
        let result = derive_fingerprint(&empty, true);
        assert_eq!(result, Err(DeriveError::InsufficientProbesAfterPin));
    }

    #[test]
    fn output_is_sha3_512_hex_length() {
        let p = probes();
        let fp = derive_fingerprint(&p, true).unwrap();
        assert_eq!(fp.len(), 128);
    }
}
