//! HMAC-SHA512 with a fresh, per-certificate random key (spec.md §4.2,
//! §4.5 step 6).
//!
//! As spec.md §9's Open Questions note records: shipping the HMAC key
//! alongside the HMAC inside the certificate makes this a checksum against
//! accidental corruption, not an integrity MAC against a capable
//! adversary. That is preserved as-documented — this module does not try
//! to manage the key's secrecy, only its correct computation.

use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Length in bytes of a freshly generated HMAC key.
pub const KEY_LEN: usize = 64;

/// Generate a fresh 64-byte random HMAC key.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Compute HMAC-SHA512 of `message` keyed by `key`.
pub fn compute(key: &[u8], message: &[u8]) -> lic_error::Result<Vec<u8>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "constructing HMAC", e))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify that `tag` is the correct HMAC-SHA512 of `message` under `key`,
/// using constant-time comparison.
pub fn verify(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    match HmacSha512::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(message);
            mac.verify_slice(tag).is_ok()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let key = generate_key();
        let tag = compute(&key, b"canonical certificate minus security block").unwrap();
        assert!(verify(&key, b"canonical certificate minus security block", &tag));
    }

    #[test]
    fn rejects_wrong_key() {
        let key = generate_key();
        let other = generate_key();
        let tag = compute(&key, b"payload").unwrap();
        assert!(!verify(&other, b"payload", &tag));
    }

    #[test]
    fn rejects_tampered_payload() {
        let key = generate_key();
        let tag = compute(&key, b"payload").unwrap();
        assert!(!verify(&key, b"payload!", &tag));
    }

    #[test]
    fn keys_are_sixty_four_bytes() {
        assert_eq!(generate_key().len(), 64);
    }
}
