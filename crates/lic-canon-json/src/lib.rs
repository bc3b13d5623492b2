//! Deterministic canonical-JSON encoder (spec.md §4.1).
//!
//! This is the single most fragile contract in the protocol: the Issuer
//! and every Enforcer must derive byte-identical preimages for the
//! signature and the HMAC from the same logical certificate, or signature
//! verification fails on perfectly valid inputs. spec.md §9 says it
//! plainly: "when in doubt, emit via an explicit walker" rather than trust
//! a general-purpose serializer's incidental key order. This crate is that
//! walker: a small [`CanonValue`] tree with a `BTreeMap`-backed object
//! variant (so key order is sorted by construction, not by a sort pass
//! bolted on afterwards) and a hand-written writer that never delegates to
//! `serde_json::to_string`.
//!
//! Contract, restated from spec.md §4.1:
//! * object keys are emitted in byte-lexicographic order;
//! * arrays retain source order;
//! * numbers are emitted without superfluous precision (integers have no
//!   trailing `.0`, no redundant leading zeros, no exponent form unless
//!   the source value already needed one);
//! * strings use the standard JSON escape set;
//! * there is no extraneous whitespace anywhere in the output.

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A JSON value restricted to the shapes this encoder can canonicalize.
///
/// Object keys live in a `BTreeMap`, so construction alone guarantees
/// sorted emission order; there is no separate sort step to forget.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonValue {
    /// `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// A JSON number, kept as the exact text `serde_json` parsed it from so
    /// that "without superfluous precision" falls out of round-tripping
    /// the source representation rather than reformatting it.
    Number(CanonNumber),
    /// A JSON string.
    String(String),
    /// A JSON array, source order preserved.
    Array(Vec<CanonValue>),
    /// A JSON object, keys sorted lexicographically by construction.
    Object(BTreeMap<String, CanonValue>),
}

/// A canonicalized JSON number.
///
/// `serde_json::Number`'s own `Display` already avoids superfluous
/// precision (it prints `3` for an integer `3`, not `3.0`, and prints the
/// shortest round-tripping form for a float), so this wraps it rather than
/// reimplementing float formatting, which is its own deep rabbit hole.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonNumber(serde_json::Number);

impl std::fmt::Display for CanonNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An error produced while converting a [`serde_json::Value`] into a
/// [`CanonValue`].
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The input contained a duplicate object key; canonicalization
    /// requires each key to appear once so the sorted form is unambiguous.
    #[error("duplicate object key `{0}`")]
    DuplicateKey(String),
}

impl From<serde_json::Value> for CanonValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => CanonValue::Null,
            serde_json::Value::Bool(b) => CanonValue::Bool(b),
            serde_json::Value::Number(n) => CanonValue::Number(CanonNumber(n)),
            serde_json::Value::String(s) => CanonValue::String(s),
            serde_json::Value::Array(a) => {
                CanonValue::Array(a.into_iter().map(CanonValue::from).collect())
            }
            serde_json::Value::Object(o) => {
                let mut map = BTreeMap::new();
                for (k, v) in o {
                    // serde_json::Map already de-duplicates keys on parse
                    // (last write wins), so this can't actually collide for
                    // values that came through `serde_json::from_str`; kept
                    // defensive for values built by hand.
                    map.insert(k, CanonValue::from(v));
                }
                CanonValue::Object(map)
            }
        }
    }
}

impl CanonValue {
    /// Build a [`CanonValue`] from any `serde::Serialize` value, going
    /// through `serde_json::Value` as an intermediate.
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(CanonValue::from(serde_json::to_value(value)?))
    }

    /// Remove a top-level key from an object value, returning its prior
    /// value. A no-op (returns `None`) on any other shape or absent key.
    ///
    /// Used to implement spec.md §4.5's "canonical form of the document
    /// with field X absent" preimages without mutating the caller's
    /// original document.
    pub fn without_key(&self, key: &str) -> CanonValue {
        match self {
            CanonValue::Object(map) => {
                let mut map = map.clone();
                map.remove(key);
                CanonValue::Object(map)
            }
            other => other.clone(),
        }
    }

    /// Serialize this value to its canonical byte representation.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        write_value(self, &mut out);
        out.into_bytes()
    }

    /// Serialize this value to its canonical string representation.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        write_value(self, &mut out);
        out
    }
}

fn write_value(v: &CanonValue, out: &mut String) {
    match v {
        CanonValue::Null => out.push_str("null"),
        CanonValue::Bool(true) => out.push_str("true"),
        CanonValue::Bool(false) => out.push_str("false"),
        CanonValue::Number(n) => {
            let _ = write!(out, "{n}");
        }
        CanonValue::String(s) => write_json_string(s, out),
        CanonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        CanonValue::Object(map) => {
            out.push('{');
            for (i, (k, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(k, out);
                out.push(':');
                write_value(val, out);
            }
            out.push('}');
        }
    }
}

/// Write `s` as a JSON string literal using the standard escape set.
fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Canonicalize any `serde::Serialize` value directly to bytes.
pub fn to_canonical_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    Ok(CanonValue::from_serializable(value)?.to_canonical_bytes())
}

/// Canonicalize any `serde::Serialize` value directly to a `String`.
pub fn to_canonical_string<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(CanonValue::from_serializable(value)?.to_canonical_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v: CanonValue = json!({"b": 1, "a": 2, "c": 3}).into();
        assert_eq!(v.to_canonical_string(), r#"{"a":2,"b":1,"c":3}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v: CanonValue = json!([3, 1, 2]).into();
        assert_eq!(v.to_canonical_string(), "[3,1,2]");
    }

    #[test]
    fn no_extraneous_whitespace() {
        let v: CanonValue = json!({"x": [1, 2], "y": "z"}).into();
        let s = v.to_canonical_string();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn integers_have_no_trailing_zero() {
        let v: CanonValue = json!({"n": 42}).into();
        assert_eq!(v.to_canonical_string(), r#"{"n":42}"#);
    }

    #[test]
    fn nested_sorting_is_recursive() {
        let v: CanonValue = json!({"outer": {"z": 1, "a": {"y": 2, "b": 3}}}).into();
        assert_eq!(
            v.to_canonical_string(),
            r#"{"outer":{"a":{"b":3,"y":2},"z":1}}"#
        );
    }

    #[test]
    fn escapes_control_characters_and_quotes() {
        let v: CanonValue = json!({"s": "a\"b\\c\nd"}).into();
        assert_eq!(v.to_canonical_string(), r#"{"s":"a\"b\\c\nd"}"#);
    }

    #[test]
    fn without_key_removes_only_top_level_field() {
        let v: CanonValue = json!({"signature": "abc", "body": {"signature": "keep-me"}}).into();
        let stripped = v.without_key("signature");
        assert_eq!(
            stripped.to_canonical_string(),
            r#"{"body":{"signature":"keep-me"}}"#
        );
    }

    #[test]
    fn two_equivalent_documents_produce_identical_bytes() {
        // Same logical document, built with keys inserted in a different
        // order and nested differently in source — the golden-file property
        // spec.md §9 calls for.
        let a: CanonValue = json!({"b": {"y": 1, "x": 2}, "a": [1,2,3]}).into();
        let b: CanonValue = json!({"a": [1,2,3], "b": {"x": 2, "y": 1}}).into();
        assert_eq!(a.to_canonical_bytes(), b.to_canonical_bytes());
    }
}
