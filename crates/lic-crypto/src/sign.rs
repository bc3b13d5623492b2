//! RSA-PSS-SHA512 signing and verification at maximum salt length.
//!
//! spec.md §4.2 calls for "PSS with MGF1-SHA-512, maximum salt length". The
//! maximum salt length for PSS is `emLen - hLen - 2` (RFC 8017 §9.1.1),
//! where `emLen` is the length in bytes of the RSA modulus (since our keys
//! always have a modulus whose bit length is a multiple of 8) and `hLen`
//! is the digest length — 64 bytes for SHA-512.

use rsa::{PaddingScheme, PublicKey, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

/// Compute the maximum PSS salt length for a key of the given modulus size
/// (in bytes), hashing with SHA-512.
fn max_salt_len(modulus_len_bytes: usize) -> usize {
    const SHA512_LEN: usize = 64;
    modulus_len_bytes.saturating_sub(SHA512_LEN + 2)
}

/// Sign `message` with `private_key`, using RSA-PSS-SHA512 at the maximum
/// salt length for that key's modulus size.
///
/// Returns the raw signature bytes.
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> lic_error::Result<Vec<u8>> {
    let digest = Sha512::digest(message);
    let salt_len = max_salt_len(private_key.size());
    let padding = PaddingScheme::new_pss_with_salt::<Sha512>(salt_len);
    private_key
        .sign(padding, &digest)
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "RSA-PSS signing", e))
}

/// Verify that `signature` is a valid RSA-PSS-SHA512 signature of `message`
/// under `public_key`, at the maximum salt length for that key's modulus
/// size.
///
/// Returns `true` only if the signature is valid; never treats a malformed
/// signature as an error distinct from an invalid one, since callers only
/// ever care about the yes/no outcome (spec.md §7's reason code
/// `invalid_signature` covers both).
pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let digest = Sha512::digest(message);
    let salt_len = max_salt_len(public_key.size());
    let padding = PaddingScheme::new_pss_with_salt::<Sha512>(salt_len);
    public_key.verify(padding, &digest, signature).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use rand_core::OsRng;

    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).expect("generate test key");
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn signs_and_verifies() {
        let (sk, pk) = test_keypair();
        let msg = b"canonical certificate bytes";
        let sig = sign(&sk, msg).unwrap();
        assert!(verify(&pk, msg, &sig));
    }

    #[test]
    fn rejects_tampered_message() {
        let (sk, pk) = test_keypair();
        let sig = sign(&sk, b"original bytes").unwrap();
        assert!(!verify(&pk, b"tampered bytes", &sig));
    }

    #[test]
    fn rejects_tampered_signature() {
        let (sk, pk) = test_keypair();
        let msg = b"canonical certificate bytes";
        let mut sig = sign(&sk, msg).unwrap();
        sig[0] ^= 0xff;
        assert!(!verify(&pk, msg, &sig));
    }
}
