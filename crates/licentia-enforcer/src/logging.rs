//! Set up `tracing` the way `arti`'s binary crate does (`app/logging.rs`),
//! mirroring `licentia-issuer`'s own setup so both binaries log the same
//! way.

use tracing_subscriber::{fmt, layer::SubscriberExt, registry, util::SubscriberInitExt, EnvFilter};

use lic_config::LoggingConfig;

/// Install the global `tracing` subscriber for this process.
pub fn setup(config: &LoggingConfig, cli_filter: Option<String>) {
    let directive = cli_filter.unwrap_or_else(|| config.filter.clone());
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!("invalid log filter directive {directive:?}, falling back to \"info\"");
        EnvFilter::new("info")
    });

    if config.json {
        registry().with(fmt::layer().json()).with(env_filter).init();
    } else {
        registry().with(fmt::layer()).with(env_filter).init();
    }
}
