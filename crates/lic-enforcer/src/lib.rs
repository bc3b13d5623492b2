//! The Enforcer agent: bundle storage, the Issuer HTTP client, the
//! certificate verifier, and the activation state machine (spec.md
//! §4.6, §5, §6).
//!
//! This crate knows nothing about how `licentia-enforcer` is actually
//! invoked (a CLI, a system service) or how its protected port is
//! served — it is the engine that binary wraps, the same split
//! `lic-issuer` draws between engine and HTTP handlers.

#![deny(missing_docs)]
#![warn(clippy::all)]

mod agent;
mod bundle;
mod client;
pub mod errorpage;
mod state;
mod supervisor;

pub use agent::{Agent, EnforcerConfig};
pub use bundle::{BundleError, BundleStore};
pub use client::{HeartbeatOutcome, IssuerClient};
pub use state::{local_check, next_state, next_state_after_heartbeat, EnforcerState, LocalCheckResult};
pub use supervisor::{LoggingSupervisor, ServiceSupervisor};
