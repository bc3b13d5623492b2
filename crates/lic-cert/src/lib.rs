//! The certificate schema, tier tables, and the signing/verification
//! contract for the node-locked licensing protocol (spec.md §3-§4.5).
//!
//! This is the crate where the protocol's central fragile contract lives:
//! a certificate is a canonical-JSON document (see `lic-canon-json`) with
//! an RSA-PSS-SHA512 signature and a keyed HMAC computed over mutually
//! consistent, but not identical, subsets of the document (spec.md
//! invariants 1-2). [`mint::mint`] produces one; [`verify::verify`] checks
//! one; [`document::Certificate`] is the document itself.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod mint;
pub mod tier;
pub mod types;
pub mod verify;

pub use document::Certificate;
pub use mint::{mint, MintParams};
pub use tier::Tier;
pub use types::{Fingerprint, ProductKey};
pub use verify::{verify, TimeStatus, Unverified, VerifyError};
