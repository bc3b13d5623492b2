//! `licentia-issuer`: the HTTP server binary wrapping [`lic_issuer::Issuer`]
//! (spec.md §4.4, §6).
//!
//! Startup sequence mirrors `arti`'s own binary crate: load configuration,
//! set up logging, load or generate the long-lived signing key, open the
//! persistent store, then serve. Everything after that point is
//! `lic-issuer`'s and `http`'s job.

mod cli;
mod config;
mod http;
mod logging;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use lic_issuer::{Issuer, StateMgrStore};
use lic_persist::{FsStateMgr, StateMgr};

use crate::cli::Cli;
use crate::config::IssuerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config: IssuerConfig = match &cli.config {
        Some(path) => lic_config::load_toml(path)?,
        None => IssuerConfig::default(),
    };
    logging::setup(&config.logging, cli.log_filter.clone());

    let keypair = Arc::new(load_or_generate_keypair(&config.signing_key_path)?);

    let state_mgr = FsStateMgr::from_path(&config.state_dir)?;
    if !state_mgr.try_lock()? {
        anyhow::bail!(
            "could not acquire exclusive lock on state directory {} (another licentia-issuer running?)",
            config.state_dir.display()
        );
    }
    let store = Arc::new(StateMgrStore::new(Arc::new(state_mgr)));
    let issuer = Arc::new(Issuer::new(store, keypair, config.docker_registry_url.clone()));

    let listen_addr = cli.listen_addr.clone().unwrap_or_else(|| config.listen_addr.clone());
    let app = http::router(issuer);

    tracing::info!(%listen_addr, "starting licentia-issuer");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }
}

/// Load the Issuer's RSA-4096 signing keypair from `path`, generating and
/// persisting a fresh one on first start (spec.md §4.2: "generated once
/// on first start of the Issuer; persisted; never rotated by the core").
fn load_or_generate_keypair(path: &Path) -> anyhow::Result<lic_crypto::KeyPair> {
    if path.exists() {
        let pem = std::fs::read_to_string(path)?;
        return Ok(lic_crypto::KeyPair::from_private_pem(&pem)?);
    }

    tracing::info!(path = %path.display(), "generating new RSA-4096 signing key (this takes a few seconds)");
    let keypair = lic_crypto::KeyPair::generate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, keypair.private_key_pem()?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(keypair)
}
