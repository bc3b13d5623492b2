//! Enforcer-side hardware fingerprint derivation and pinning (spec.md
//! §4.3): turns heterogeneous hardware probes into a single deterministic,
//! high-entropy identity string, and detects when that identity changes
//! out from under an already-activated bundle.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod derive;
pub mod pin;
pub mod probes;

pub use derive::{derive_fingerprint, DeriveError};
pub use pin::{check_and_pin, load_pin, write_pin, PinError, PinOutcome, PinRecord};
pub use probes::{FixedProbes, HardwareProbes, RealProbes};
