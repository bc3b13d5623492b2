//! The licensing authority: customer/machine bookkeeping, quota
//! enforcement, and the six wire operations (spec.md §4.4).
//!
//! This crate knows nothing about HTTP — it is the engine a binary like
//! `licentia-issuer` wraps in request handlers. Mirrors the split `arti`
//! keeps between `tor-dirmgr` (policy and state) and `arti-client`
//! (the thing that actually answers a caller).

#![deny(missing_docs)]
#![warn(clippy::all)]

mod compose;
mod engine;
mod store;
mod types;

pub use engine::{
    ActivateOutcome, CreateCustomerOptions, HeartbeatOutcome, Issuer, RevokeTarget, UpgradeError,
    UpgradeOptions, UpgradeResult, ValidateOutcome,
};
pub use store::{Store, StateMgrStore};
pub use types::{Customer, Machine};
