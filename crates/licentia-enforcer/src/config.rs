//! Layered TOML configuration for the Enforcer binary (spec.md §4.6, §6,
//! §9), in the same shape `licentia-issuer`'s own `IssuerConfig` uses.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The Enforcer's full configuration, loaded via [`lic_config::load_toml`]
/// and then overridden by whatever [`crate::cli::Cli`] flags were passed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Root directory of the activation bundle (spec.md §6's on-disk
    /// layout).
    pub install_dir: PathBuf,
    /// Base URL of the Issuer this installation activates against.
    pub issuer_base_url: String,
    /// How often the background loop re-runs the local check, in seconds
    /// (spec.md §4.6: "nominally one hour").
    pub revalidation_interval_secs: u64,
    /// How often the background loop sends a heartbeat, in seconds.
    pub heartbeat_interval_secs: u64,
    /// The application service name this installation requires to be
    /// enabled, if any.
    pub required_service: Option<String>,
    /// Address the error-page listener binds to (spec.md §7: "a static
    /// error page on the service's configured port").
    pub protected_listen_addr: String,
    /// This agent's own version string, reported at activation as
    /// `app_version`.
    pub app_version: String,
    /// Logging configuration, shared in shape with the Issuer's.
    pub logging: lic_config::LoggingConfig,
}

impl EnforcerConfig {
    /// The revalidation interval as a [`Duration`].
    pub fn revalidation_interval(&self) -> Duration {
        Duration::from_secs(self.revalidation_interval_secs)
    }

    /// The heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        EnforcerConfig {
            install_dir: PathBuf::from("/opt/licentia"),
            issuer_base_url: "https://issuer.example:8443".to_string(),
            revalidation_interval_secs: 3600,
            heartbeat_interval_secs: 300,
            required_service: None,
            protected_listen_addr: "0.0.0.0:8000".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            logging: lic_config::LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_overrides_over_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "issuer_base_url = \"https://issuer.internal\"\n[logging]\nfilter = \"debug\"\n"
        )
        .unwrap();
        let config: EnforcerConfig = lic_config::load_toml(f.path()).unwrap();
        assert_eq!(config.issuer_base_url, "https://issuer.internal");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.revalidation_interval_secs, EnforcerConfig::default().revalidation_interval_secs);
    }

    #[test]
    fn interval_helpers_convert_seconds() {
        let config = EnforcerConfig {
            revalidation_interval_secs: 120,
            heartbeat_interval_secs: 30,
            ..EnforcerConfig::default()
        };
        assert_eq!(config.revalidation_interval(), Duration::from_secs(120));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }
}
