//! Command-line flags for the Issuer binary. Layered over [`crate::config::IssuerConfig`]
//! the way `arti`'s own binaries let a handful of CLI flags override the
//! TOML file (spec.md §9 explicitly excludes a diagnostics CLI from the
//! core, so this is just enough surface to start the server).

use std::path::PathBuf;

use clap::Parser;

/// The licensing authority's HTTP server.
#[derive(Debug, Parser)]
#[command(name = "licentia-issuer", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file. If omitted, built-in defaults are
    /// used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured listen address (e.g. `0.0.0.0:8443`).
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Override the configured `tracing` filter directive.
    #[arg(long)]
    pub log_filter: Option<String>,
}
