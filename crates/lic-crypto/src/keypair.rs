//! RSA-4096 keypair generation and PEM (de)serialization.

use lic_safelog::Sensitive;
use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Modulus size in bits for every keypair this service generates.
///
/// Fixed per the protocol; the core never negotiates a different key size.
pub const KEY_BITS: usize = 4096;

/// An RSA-4096 keypair: a PKCS#8 private key and its SubjectPublicKeyInfo
/// public half.
///
/// The private half is wrapped in [`Sensitive`] so that an accidental
/// `{:?}` of a [`KeyPair`] in a log line does not leak key material (see
/// `lic-safelog`'s redaction rules); reach for [`KeyPair::private_key`]
/// when you actually need it.
#[derive(Clone)]
pub struct KeyPair {
    private: Sensitive<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"[scrubbed]")
            .field("public_key_bits", &(self.public.size() * 8))
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh RSA-4096 keypair.
    ///
    /// This is slow (RSA-4096 generation routinely takes multiple seconds)
    /// and is meant to be called at most once per Issuer process lifetime,
    /// at first start.
    pub fn generate() -> lic_error::Result<Self> {
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "generating RSA-4096 keypair", e))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Sensitive::new(private),
            public,
        })
    }

    /// Load a keypair from a PKCS#8 private-key PEM. The public key is
    /// derived from it, not read separately.
    pub fn from_private_pem(pem: &str) -> lic_error::Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "parsing PKCS#8 private key", e))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Sensitive::new(private),
            public,
        })
    }

    /// Encode the private key as a PKCS#8 PEM document.
    pub fn private_key_pem(&self) -> lic_error::Result<String> {
        self.private
            .as_inner()
            .to_pkcs8_pem(LineEnding::LF)
            .map(|z| z.to_string())
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "encoding private key", e))
    }

    /// Encode the public key as a SubjectPublicKeyInfo PEM document.
    pub fn public_key_pem(&self) -> lic_error::Result<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "encoding public key", e))
    }

    /// The private key, for signing.
    pub fn private_key(&self) -> &RsaPrivateKey {
        self.private.as_inner()
    }

    /// The public key, for verification.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }
}

/// Parse a standalone SubjectPublicKeyInfo PEM document (as distributed to
/// Enforcers by the `/api/v1/public-key` endpoint).
pub fn public_key_from_pem(pem: &str) -> lic_error::Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "parsing public key", e))
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_test_key() -> RsaPrivateKey {
        // 4096-bit generation is slow; tests that don't care about the
        // production key size use a much smaller key so the suite stays fast.
        RsaPrivateKey::new(&mut OsRng, 512).expect("generate test key")
    }

    #[test]
    fn pem_round_trips() {
        let private = small_test_key();
        let public = RsaPublicKey::from(&private);
        let kp = KeyPair {
            private: Sensitive::new(private),
            public,
        };
        let pem = kp.private_key_pem().unwrap();
        let reloaded = KeyPair::from_private_pem(&pem).unwrap();
        assert_eq!(
            reloaded.public_key().to_public_key_pem(LineEnding::LF).unwrap(),
            kp.public_key().to_public_key_pem(LineEnding::LF).unwrap()
        );
    }

    #[test]
    fn debug_does_not_print_private_key() {
        let private = small_test_key();
        let public = RsaPublicKey::from(&private);
        let kp = KeyPair {
            private: Sensitive::new(private),
            public,
        };
        let printed = format!("{:?}", kp);
        assert!(printed.contains("scrubbed"));
    }
}
