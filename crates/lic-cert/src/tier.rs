//! Tier tags and the authoritative default tables (spec.md §6).

use serde::{Deserialize, Serialize};

caret::caret_enum! {
    /// A named capability bundle determining default services, quotas, and
    /// validity (spec.md Glossary).
    ///
    /// Wrapped in [`caret::caret_enum!`] rather than a plain Rust `enum` so
    /// that a `custom` tag (or any tier name a future Issuer build
    /// introduces) round-trips through an older Enforcer instead of
    /// failing to parse — the same reasoning spec.md §7 gives for the
    /// reason-code enumerations.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub enum Tier as str {
        /// Single machine, 14-day validity, frontend only.
        Trial => "trial",
        /// Small team tier.
        Basic => "basic",
        /// Mid-size team tier.
        Pro => "pro",
        /// Unlimited-session, full-service tier.
        Enterprise => "enterprise",
        /// A tier whose quotas and services were set explicitly at
        /// creation time rather than from one of the named tables below.
        Custom => "custom",
    }
}

/// The default quotas and entitlements a tier confers, absent any explicit
/// per-customer override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierDefaults {
    /// Maximum number of machines that may be simultaneously activated.
    pub max_machines: u32,
    /// Default certificate validity window, in days.
    pub valid_days: u32,
    /// Maximum concurrent sessions, or `None` for unlimited.
    pub concurrent_sessions: Option<u32>,
    /// Maximum API calls per rate-limit window, or `None` for unlimited.
    pub api_rate_limit: Option<u32>,
    /// The service names this tier enables by default.
    pub services: &'static [&'static str],
}

/// A grace-period length, in days, applied uniformly across tiers.
///
/// spec.md does not vary the grace window by tier, so this is a single
/// workspace-wide constant rather than a per-tier table column.
pub const DEFAULT_GRACE_DAYS: u32 = 7;

/// Known Docker service slots, in a stable order used when building a
/// certificate's Docker block (spec.md §3's "service map of
/// `{enabled, image, tag, container port, host port, required}`").
pub const ALL_SERVICES: &[&str] = &["frontend", "backend", "analytics", "monitoring"];

/// Look up the authoritative defaults for `tier` (spec.md §6's tier
/// table). Unrecognized or [`Tier::Custom`] tiers fall back to the
/// narrowest (trial) defaults — a customer created with `Tier::Custom`
/// is expected to have every quota supplied explicitly at creation time;
/// this fallback only protects against an omission, it is not itself the
/// custom tier's contract.
pub fn defaults(tier: &Tier) -> TierDefaults {
    match tier {
        Tier::Trial => TierDefaults {
            max_machines: 1,
            valid_days: 14,
            concurrent_sessions: Some(1),
            api_rate_limit: Some(100),
            services: &["frontend"],
        },
        Tier::Basic => TierDefaults {
            max_machines: 3,
            valid_days: 365,
            concurrent_sessions: Some(5),
            api_rate_limit: Some(1000),
            services: &["frontend", "backend"],
        },
        Tier::Pro => TierDefaults {
            max_machines: 10,
            valid_days: 365,
            concurrent_sessions: Some(20),
            api_rate_limit: Some(5000),
            services: &["frontend", "backend", "analytics"],
        },
        Tier::Enterprise => TierDefaults {
            max_machines: 100,
            valid_days: 365,
            concurrent_sessions: None,
            api_rate_limit: None,
            services: &["frontend", "backend", "analytics", "monitoring"],
        },
        Tier::Custom | Tier::Unrecognized(_) => TierDefaults {
            max_machines: 1,
            valid_days: 14,
            concurrent_sessions: Some(1),
            api_rate_limit: Some(100),
            services: &[],
        },
    }
}

/// Tier-derived feature flags (spec.md §3's "feature-flag map: tier-derived
/// capabilities"). Not named explicitly by spec.md's tier table, so this
/// workspace defines a small, monotonically increasing-with-tier set.
pub fn feature_flags(tier: &Tier) -> std::collections::BTreeMap<String, bool> {
    let (priority_support, sso, audit_log, custom_branding) = match tier {
        Tier::Trial => (false, false, false, false),
        Tier::Basic => (false, false, false, false),
        Tier::Pro => (true, false, true, false),
        Tier::Enterprise => (true, true, true, true),
        Tier::Custom | Tier::Unrecognized(_) => (false, false, false, false),
    };
    let mut map = std::collections::BTreeMap::new();
    map.insert("priority_support".to_string(), priority_support);
    map.insert("sso".to_string(), sso);
    map.insert("audit_log".to_string(), audit_log);
    map.insert("custom_branding".to_string(), custom_branding);
    map
}

/// Default container image coordinates for a known service slot, used when
/// minting a certificate's Docker block.
pub fn docker_defaults(service: &str) -> (&'static str, &'static str, u16, u16, bool) {
    // (image, tag, container_port, host_port, required)
    match service {
        "frontend" => ("licentia/frontend", "latest", 3000, 3000, true),
        "backend" => ("licentia/backend", "latest", 8080, 8080, true),
        "analytics" => ("licentia/analytics", "latest", 9090, 9090, false),
        "monitoring" => ("licentia/monitoring", "latest", 9100, 9100, false),
        other => {
            // An unrecognized service name: still needs a deterministic,
            // non-panicking default so `upgrade`'s `additional_services`
            // can name arbitrary service strings.
            let _ = other;
            ("licentia/service", "latest", 8000, 8000, false)
        }
    }
}

/// A minimal `Serialize`/`Deserialize` mirror of [`TierDefaults`] for
/// callers (e.g. the admin listing accessors) that want to hand a tier's
/// defaults across the wire without re-deriving them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TierDefaultsView {
    /// See [`TierDefaults::max_machines`].
    pub max_machines: u32,
    /// See [`TierDefaults::valid_days`].
    pub valid_days: u32,
    /// See [`TierDefaults::concurrent_sessions`].
    pub concurrent_sessions: Option<u32>,
    /// See [`TierDefaults::api_rate_limit`].
    pub api_rate_limit: Option<u32>,
    /// See [`TierDefaults::services`].
    pub services: Vec<String>,
}

impl From<TierDefaults> for TierDefaultsView {
    fn from(d: TierDefaults) -> Self {
        TierDefaultsView {
            max_machines: d.max_machines,
            valid_days: d.valid_days,
            concurrent_sessions: d.concurrent_sessions,
            api_rate_limit: d.api_rate_limit,
            services: d.services.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trial_matches_spec_table() {
        let d = defaults(&Tier::Trial);
        assert_eq!(d.max_machines, 1);
        assert_eq!(d.valid_days, 14);
        assert_eq!(d.concurrent_sessions, Some(1));
        assert_eq!(d.api_rate_limit, Some(100));
        assert_eq!(d.services, &["frontend"]);
    }

    #[test]
    fn enterprise_is_unlimited() {
        let d = defaults(&Tier::Enterprise);
        assert_eq!(d.max_machines, 100);
        assert_eq!(d.concurrent_sessions, None);
        assert_eq!(d.api_rate_limit, None);
        assert_eq!(d.services.len(), 4);
    }

    #[test]
    fn tier_round_trips_through_wire_representation() {
        assert_eq!(Tier::from_str("pro"), Tier::Pro);
        assert_eq!(Tier::Pro.as_str(), "pro");
        assert_eq!(Tier::from_str("gold"), Tier::Unrecognized("gold".to_string()));
    }
}
