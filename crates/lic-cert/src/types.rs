//! Trust-boundary newtypes and the product-key format (spec.md §6).
//!
//! A bare `String` is easy to pass positionally in the wrong order —
//! `activate(fingerprint, product_key)` instead of
//! `activate(product_key, fingerprint)` compiles either way. `tor-linkspec`
//! and `tor-llcrypto` use distinct newtypes for exactly this reason around
//! key and address material; this module does the same for the two
//! identifiers that cross the Issuer/Enforcer trust boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A customer's human-entered, globally-unique activation handle
/// (spec.md §3's "product key is the external handle").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

impl ProductKey {
    /// Wrap an already-formatted product key string.
    pub fn new(s: impl Into<String>) -> Self {
        ProductKey(s.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A high-entropy, opaque hash binding a certificate to one physical host
/// (spec.md §4.3). Always lowercase hex in this workspace, but callers
/// should not assume a fixed length beyond "whatever `lic-fingerprint`
/// produced".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed fingerprint string.
    pub fn new(s: impl Into<String>) -> Self {
        Fingerprint(s.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alphabet for the random block and checksum of a product key: alphanumeric,
/// excluding the visually confusable characters `0`, `O`, `1`, `I`
/// (spec.md §6).
const KEY_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of the random alphanumeric block.
const RANDOM_BLOCK_LEN: usize = 8;

/// Length of the checksum suffix.
const CHECKSUM_LEN: usize = 3;

/// Derive a 4-character, uppercase-alphanumeric prefix from a customer's
/// display name (spec.md §6: "a human-readable string derived from the
/// name prefix").
fn company_prefix(display_name: &str) -> String {
    let letters: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let mut prefix: String = letters.chars().take(4).collect();
    while prefix.len() < 4 {
        prefix.push('X');
    }
    prefix
}

/// Deterministically derive the 3-character checksum suffix from the first
/// three dash-separated parts of a product key.
///
/// spec.md §6 requires this to be "derived deterministically from the
/// first three parts" but does not pin an algorithm, and §9's Open
/// Questions note the checksum is never enforced on the activation path
/// regardless — existence in the customer store is the only real gate.
/// This uses a simple accumulating checksum over the input bytes, mapped
/// into [`KEY_ALPHABET`]; its only job is to give defensive callers
/// (`verify_checksum`) something to check, not to resist forgery.
pub fn compute_checksum(prefix: &str, year: &str, random_block: &str) -> String {
    let joined = format!("{prefix}-{year}-{random_block}");
    let mut acc: u32 = 5381;
    for b in joined.bytes() {
        acc = acc.wrapping_mul(33).wrapping_add(b as u32);
    }
    let mut out = String::with_capacity(CHECKSUM_LEN);
    for i in 0..CHECKSUM_LEN {
        let shifted = acc.rotate_left((i as u32) * 7);
        let idx = (shifted as usize) % KEY_ALPHABET.len();
        out.push(KEY_ALPHABET[idx] as char);
    }
    out
}

/// Generate a fresh product key for a newly created customer (spec.md §4.4
/// `create-customer`).
///
/// Format: `<4-char company prefix>-<4-digit year>-<8-char random
/// block>-<3-char checksum>`.
pub fn generate_product_key(display_name: &str, year: u32, mut random_bytes: impl FnMut(&mut [u8])) -> ProductKey {
    let prefix = company_prefix(display_name);
    let year = format!("{year:04}");

    let mut raw = [0u8; RANDOM_BLOCK_LEN];
    random_bytes(&mut raw);
    let random_block: String = raw
        .iter()
        .map(|b| KEY_ALPHABET[(*b as usize) % KEY_ALPHABET.len()] as char)
        .collect();

    let checksum = compute_checksum(&prefix, &year, &random_block);
    ProductKey::new(format!("{prefix}-{year}-{random_block}-{checksum}"))
}

/// Defensively verify a product key's checksum suffix.
///
/// Per spec.md §9's Open Questions: this is optional defensive code. The
/// authoritative activation gate is existence of the key in the customer
/// store, not this check — a key that fails this check but is present in
/// the store must still be honored.
pub fn verify_checksum(key: &ProductKey) -> bool {
    let parts: Vec<&str> = key.as_str().split('-').collect();
    if parts.len() != 4 {
        return false;
    }
    let expected = compute_checksum(parts[0], parts[1], parts[2]);
    expected == parts[3]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_key_has_expected_shape() {
        let mut counter = 0u8;
        let key = generate_product_key("Acme Corp", 2026, |buf| {
            for b in buf.iter_mut() {
                *b = counter;
                counter = counter.wrapping_add(37);
            }
        });
        let parts: Vec<&str> = key.as_str().split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ACME");
        assert_eq!(parts[1], "2026");
        assert_eq!(parts[2].len(), RANDOM_BLOCK_LEN);
        assert_eq!(parts[3].len(), CHECKSUM_LEN);
    }

    #[test]
    fn generated_key_passes_its_own_checksum() {
        let key = generate_product_key("Trial", 2026, |buf| buf.fill(7));
        assert!(verify_checksum(&key));
    }

    #[test]
    fn tampered_key_fails_checksum() {
        let key = generate_product_key("Trial", 2026, |buf| buf.fill(7));
        let tampered = ProductKey::new(key.as_str().replacen("7-2026", "7-2025", 1));
        assert!(!verify_checksum(&tampered));
    }

    #[test]
    fn short_display_name_is_padded() {
        let mut counter = 0u8;
        let key = generate_product_key("A", 2026, |buf| {
            for b in buf.iter_mut() {
                *b = counter;
                counter = counter.wrapping_add(3);
            }
        });
        assert_eq!(&key.as_str()[..4], "AXXX");
    }

    #[test]
    fn excludes_confusable_characters() {
        for i in 0u8..=255 {
            let c = KEY_ALPHABET[(i as usize) % KEY_ALPHABET.len()] as char;
            assert!(!matches!(c, '0' | 'O' | '1' | 'I'));
        }
    }
}
