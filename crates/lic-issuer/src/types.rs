//! Customer and machine rows held by the Issuer's store (spec.md §4.4).
//!
//! These are the Issuer's own bookkeeping records, distinct from
//! [`lic_cert::Certificate`]: a certificate is a point-in-time signed
//! snapshot handed to an Enforcer, while a [`Customer`]/[`Machine`] row is
//! the mutable ledger entry the Issuer consults on every call to decide
//! what the *next* certificate should say.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lic_cert::{Certificate, Fingerprint, ProductKey, Tier};

/// A licensed customer account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Customer {
    /// Opaque id, stable for the customer's lifetime.
    pub id: String,
    /// Display name, shown in certificates and admin listings.
    pub display_name: String,
    /// The external activation handle (spec.md §6).
    pub product_key: ProductKey,
    /// The tier this customer is currently licensed under.
    pub tier: Tier,
    /// Maximum machines this customer may have simultaneously activated.
    pub max_machines: u32,
    /// Maximum concurrent sessions per machine, or `None` for unlimited.
    pub concurrent_sessions: Option<u32>,
    /// Maximum API calls per rate-limit window, or `None` for unlimited.
    pub api_rate_limit: Option<u32>,
    /// The service names enabled for this customer's certificates.
    pub services: Vec<String>,
    /// Whether this customer's access has been revoked (spec.md §4.4
    /// `revoke`). A revoked customer fails every subsequent activate,
    /// validate, and heartbeat regardless of certificate validity.
    pub revoked: bool,
    /// When this customer account was created.
    pub created_at: DateTime<Utc>,
}

/// A single activated machine belonging to a [`Customer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Machine {
    /// Opaque id, matches the `machine_id` embedded in `certificate`.
    pub id: String,
    /// The owning customer's id.
    pub customer_id: String,
    /// This machine's hardware fingerprint (spec.md §4.3).
    pub fingerprint: Fingerprint,
    /// The hostname reported at activation time.
    pub hostname: String,
    /// This machine's 1-based index among the customer's activations at
    /// the time it was first activated (spec.md §3's "current machine
    /// index"), held fixed across reactivation and upgrade.
    pub machine_index: u32,
    /// The most recently minted certificate for this machine.
    pub certificate: Certificate,
    /// The Docker registry access token sealed into this machine's bundle.
    /// Generated once, at first activation, and reused across
    /// reactivation and upgrade so a rotated bundle does not invalidate
    /// registry sessions already pulled by running containers.
    pub docker_token: String,
    /// Whether this machine has been individually revoked (spec.md §4.4
    /// `revoke`), independent of its owning customer's status.
    pub revoked: bool,
    /// When this machine was first activated.
    pub created_at: DateTime<Utc>,
    /// When this machine was last touched by a successful activate,
    /// validate, or heartbeat call (spec.md §3, §4.4).
    pub last_seen: DateTime<Utc>,
}
