//! Layered TOML configuration for the Issuer binary (spec.md §6, §9).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The Issuer's full configuration, loaded via [`lic_config::load_toml`]
/// and then overridden by whatever [`crate::cli::Cli`] flags were passed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IssuerConfig {
    /// Address the HTTP server binds to, e.g. `"0.0.0.0:8443"`.
    pub listen_addr: String,
    /// Directory holding the Issuer's `FsStateMgr` customer/machine tables.
    pub state_dir: PathBuf,
    /// PEM file holding the Issuer's RSA-4096 signing key pair. Generated
    /// and written here on first startup if it doesn't exist yet.
    pub signing_key_path: PathBuf,
    /// Docker registry base URL stamped into every minted certificate's
    /// Docker block and every sealed credentials envelope (spec.md §3).
    pub docker_registry_url: String,
    /// Logging configuration, shared in shape with the Enforcer's.
    pub logging: lic_config::LoggingConfig,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        IssuerConfig {
            listen_addr: "127.0.0.1:8443".to_string(),
            state_dir: PathBuf::from("/var/lib/licentia-issuer"),
            signing_key_path: PathBuf::from("/var/lib/licentia-issuer/signing_key.pem"),
            docker_registry_url: "registry.example.com".to_string(),
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
        writeln!(f, "listen_addr = \"0.0.0.0:9000\"\n[logging]\nfilter = \"debug\"\n").unwrap();
        let config: IssuerConfig = lic_config::load_toml(f.path()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.docker_registry_url, IssuerConfig::default().docker_registry_url);
    }
}
