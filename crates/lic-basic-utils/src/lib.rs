//! General helpers shared across the licensing-service crates.
//!
//! Nothing here is specific to certificates or activation; it's the same
//! kind of small, dependency-light grab-bag `tor-basic-utils` is in the
//! teacher workspace.

#![deny(missing_docs)]
#![warn(clippy::all)]

use rand::Rng;

/// Alphabet used for human-facing random tokens (product-key blocks,
/// alphanumeric suffixes). Excludes visually confusable characters
/// (`0`, `O`, `1`, `I`) per spec.md §6's product-key format.
pub const UNAMBIGUOUS_ALPHANUM: &[u8] =
    b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz";

/// Return a random string of `len` characters drawn from
/// [`UNAMBIGUOUS_ALPHANUM`].
pub fn random_unambiguous_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..UNAMBIGUOUS_ALPHANUM.len());
            UNAMBIGUOUS_ALPHANUM[idx] as char
        })
        .collect()
}

/// Return `n` fresh random bytes.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill(buf.as_mut_slice());
    buf
}

/// Return a fresh random 128-bit value, hex-encoded.
///
/// Used as the fingerprint deriver's last-resort fallback token when too
/// few real hardware components were observed (spec.md §4.3).
pub fn random_hex_128() -> String {
    hex::encode(random_bytes(16))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_excludes_confusable_chars() {
        let t = random_unambiguous_token(256);
        for c in t.chars() {
            assert!(!"0O1I".contains(c), "token contained confusable char {c}");
        }
    }

    #[test]
    fn token_length() {
        assert_eq!(random_unambiguous_token(8).len(), 8);
        assert_eq!(random_unambiguous_token(0).len(), 0);
    }

    #[test]
    fn random_hex_is_32_chars() {
        assert_eq!(random_hex_128().len(), 32);
    }
}
