//! AES-256-GCM sealing of local artifacts (spec.md §4.2): the encrypted
//! certificate copy and the encrypted Docker registry credentials in the
//! Enforcer's activation bundle.
//!
//! Wire format: a 12-byte random nonce, followed by the ciphertext with its
//! GCM authentication tag appended (the `aes-gcm` crate's `encrypt` already
//! appends the tag, so this module just prefixes the nonce).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Length in bytes of the random nonce prefix.
const NONCE_LEN: usize = 12;

/// Derive a 256-bit AES key as `SHA-256(key_material)`.
///
/// `key_material` is the machine fingerprint bytes for both of the bundle's
/// sealed artifacts (spec.md §3's activation bundle: "key = SHA-256(fingerprint)").
pub fn derive_key(key_material: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(key_material);
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Seal `plaintext` under `key_material` (see [`derive_key`]), returning
/// `nonce || ciphertext+tag`.
pub fn seal(key_material: &[u8], plaintext: &[u8]) -> lic_error::Result<Vec<u8>> {
    let key_bytes = derive_key(key_material);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "AES-256-GCM seal", std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Reverse [`seal`]: split `nonce || ciphertext+tag` and decrypt under
/// `key_material`.
pub fn open(key_material: &[u8], sealed: &[u8]) -> lic_error::Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(lic_error::internal!(
            "sealed artifact shorter than the {}-byte nonce prefix",
            NONCE_LEN
        ));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let key_bytes = derive_key(key_material);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "AES-256-GCM open", std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let fp = b"deadbeefcafef00d";
        let sealed = seal(fp, b"{\"registry\":\"r\",\"username\":\"u\",\"token\":\"t\"}").unwrap();
        let opened = open(fp, &sealed).unwrap();
        assert_eq!(opened, b"{\"registry\":\"r\",\"username\":\"u\",\"token\":\"t\"}");
    }

    #[test]
    fn nonce_prefix_is_random_each_time() {
        let fp = b"fingerprint";
        let a = seal(fp, b"payload").unwrap();
        let b = seal(fp, b"payload").unwrap();
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
    }

    #[test]
    fn wrong_key_material_fails_to_open() {
        let sealed = seal(b"fingerprint-a", b"secret").unwrap();
        assert!(open(b"fingerprint-b", &sealed).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(open(b"fingerprint", b"short").is_err());
    }
}
