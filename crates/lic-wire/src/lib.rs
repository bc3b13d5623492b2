//! Wire DTOs for the licensing protocol's six HTTP endpoints (spec.md §6)
//! and the closed reason-code enumerations (spec.md §7).
//!
//! These types describe *transport* JSON (ordinary `serde_json`
//! serialization, field order irrelevant) — not the *canonical* JSON used
//! for signatures and HMACs, which lives in `lic-canon-json` and is only
//! ever applied to the embedded [`lic_cert::Certificate`] itself.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod activate;
pub mod health;
pub mod heartbeat;
pub mod reason;
pub mod upgrade;
pub mod validate;

pub use activate::{ActivateRequest, ActivateResponse, Bundle, DockerCredentials, DockerCredentialsEnvelope};
pub use health::HealthResponse;
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse};
pub use reason::{ActivationReason, HeartbeatReason, ValidationReason};
pub use upgrade::{UpgradeRequest, UpgradeResponse};
pub use validate::{ValidateRequest, ValidateResponse};
