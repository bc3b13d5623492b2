//! Command-line flags for the Enforcer binary: request activation or an
//! upgrade against the configured Issuer, or run the startup check and
//! background revalidation loop (spec.md §4.6).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The client-side licensing enforcement agent.
#[derive(Debug, Parser)]
#[command(name = "licentia-enforcer", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file. If omitted, built-in defaults are
    /// used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured `tracing` filter directive.
    #[arg(long)]
    pub log_filter: Option<String>,

    /// What to do this run. Defaults to [`Command::Run`].
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// A one-shot action, or the long-running agent loop.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Activate this installation against the configured Issuer, writing a
    /// fresh bundle (spec.md §4.4 `activate`).
    Activate {
        /// The customer's product key.
        product_key: String,
    },
    /// Request a tier/quota/service upgrade for the already-activated
    /// machine on this host (spec.md §4.4 `upgrade`).
    Upgrade {
        /// A new tier to move to.
        #[arg(long)]
        new_tier: Option<String>,
        /// Days to add to the certificate's current `valid_until`.
        #[arg(long)]
        additional_days: Option<u32>,
    },
    /// Run the startup check, then the background revalidation/heartbeat
    /// loop and the protected-port error page, until interrupted. This is
    /// the default when no subcommand is given.
    Run,
}
