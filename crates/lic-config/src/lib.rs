//! Layered TOML configuration for the Issuer and Enforcer binaries.
//!
//! Configuration is loaded the way `arti`/`tor-config` load theirs: defaults
//! baked into the binary, overridden by a TOML file, overridden again by
//! command-line overrides, assembled via the `config` crate and validated
//! with `derive_builder`-generated builders so that a malformed or
//! unrecognized key is caught before the service starts rather than
//! silently ignored (spec.md §9's "unknown keys should be rejected, not
//! silently ignored").

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod list_builder;

// Re-exported so macros generated by `list_builder` can refer to these
// crates via `$crate::...` without every downstream crate adding its own
// direct dependency on them.
#[doc(hidden)]
pub use derive_builder;
#[doc(hidden)]
pub use educe;
#[doc(hidden)]
pub use paste;
#[doc(hidden)]
pub use serde;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An error produced while building a validated configuration struct from
/// its builder.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid configuration field `{field}`: {problem}")]
pub struct ConfigBuildError {
    /// The field that failed to build.
    pub field: String,
    /// A description of the problem.
    pub problem: String,
}

impl From<derive_builder::UninitializedFieldError> for ConfigBuildError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        ConfigBuildError {
            field: e.field_name().to_string(),
            problem: "required field was not set".to_string(),
        }
    }
}

/// Choose whichever of a list of token-trees is non-empty.
///
/// Used internally by [`list_builder::define_list_builder_helper`] to
/// provide a default expression when the caller didn't supply one.
#[doc(hidden)]
#[macro_export]
macro_rules! macro_first_nonempty {
    { [ ], [ $($fallback:tt)* ] } => { $($fallback)* };
    { [ $($found:tt)+ ], [ $($fallback:tt)* ] } => { $($found)+ };
}

/// Load a TOML configuration file from `path`, layering it over
/// `Default::default()` for `T`, and failing on unrecognized top-level
/// keys.
///
/// `T` is expected to be a `serde`-deserializable, `Default`-implementing
/// struct (typically itself the output of a `derive_builder` builder).
pub fn load_toml<T>(path: &Path) -> Result<T, lic_error::Error>
where
    T: serde::de::DeserializeOwned,
{
    let text = std::fs::read_to_string(path).map_err(|e| {
        lic_error::Error::wrap(
            lic_error::ErrorKind::Config,
            format!("reading config file {}", path.display()),
            e,
        )
    })?;
    toml::from_str(&text).map_err(|e| {
        lic_error::Error::wrap(
            lic_error::ErrorKind::Config,
            format!("parsing config file {}", path.display()),
            e,
        )
    })
}

/// Expand a leading `~` in `input` to the current user's home directory.
///
/// Falls back to returning `input` unchanged if the home directory cannot
/// be determined, matching `tor-config`'s tolerant behavior for
/// path-expansion.
#[cfg(feature = "expand-paths")]
pub fn expand_path(input: &str) -> PathBuf {
    match shellexpand::tilde(input) {
        std::borrow::Cow::Borrowed(s) => PathBuf::from(s),
        std::borrow::Cow::Owned(s) => PathBuf::from(s),
    }
}

/// Configuration shared by both the Issuer and the Enforcer: where to log,
/// and at what level.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// A `tracing-subscriber` `EnvFilter` directive string, e.g. `"info"` or
    /// `"licentia_issuer=debug,warn"`.
    pub filter: String,
    /// Emit logs as single-line JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn loads_toml_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[logging]\nfilter = \"debug\"\n").unwrap();
        let loaded: Sample = load_toml(f.path()).unwrap();
        assert_eq!(loaded.logging.filter, "debug");
        assert!(!loaded.logging.json);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result: Result<Sample, _> = load_toml(Path::new("/no/such/config.toml"));
        assert!(result.is_err());
    }
}
