//! SHA3-512 hashing, used for both the machine-fingerprint derivation and
//! the certificate's `security.fingerprint_hash` field.

use sha3::{Digest, Sha3_512};

/// Hash `data` with SHA3-512 and return the lowercase hex encoding.
pub fn sha3_512_hex(data: &[u8]) -> String {
    let digest = Sha3_512::digest(data);
    hex::encode(digest)
}

/// Hash `data` with SHA3-512 and return the raw digest bytes.
pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let digest = Sha3_512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_is_deterministic() {
        let a = sha3_512_hex(b"hostname:box1|machine:x86_64|system:Linux");
        let b = sha3_512_hex(b"hostname:box1|machine:x86_64|system:Linux");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(sha3_512_hex(b"a"), sha3_512_hex(b"b"));
    }
}
