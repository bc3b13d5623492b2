//! Cryptographic primitives for the licensing protocol.
//!
//! This crate wraps exactly the four primitives the certificate contract
//! needs, keeping the wrapping as thin as `tor-llcrypto` keeps its own
//! curve25519/ed25519 wrappers:
//!
//! * [`keypair`] — RSA-4096 keypair generation, PKCS#8/SPKI PEM I/O.
//! * [`sign`] — RSA-PSS-SHA512 signing and verification at maximum salt length.
//! * [`hash`] — SHA3-512 hashing, for the fingerprint and `security.fingerprint_hash`.
//! * [`mac`] — HMAC-SHA512 with a per-certificate random key.
//! * [`aead`] — AES-256-GCM sealing of local artifacts, keyed by `SHA-256(fingerprint)`.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod aead;
pub mod hash;
pub mod keypair;
pub mod mac;
pub mod sign;

pub use keypair::KeyPair;
