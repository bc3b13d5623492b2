//! `licentia-enforcer`: the client-side agent binary wrapping
//! [`lic_enforcer::Agent`] (spec.md §4.3, §4.6, §6).
//!
//! Three things this binary can do, selected by subcommand: request a
//! fresh activation, request an upgrade for an already-activated machine,
//! or run the startup check followed by the background revalidation loop
//! and the protected-port error page (the default, and the only one a
//! long-lived deployment actually uses day to day).

mod cli;
mod config;
mod http;
mod logging;

use std::sync::Arc;

use clap::Parser;
use chrono::Utc;
use lic_enforcer::{Agent, EnforcerConfig as AgentConfig, LoggingSupervisor};
use lic_fingerprint::{check_and_pin, PinOutcome, RealProbes};
use lic_wire::{ActivateRequest, UpgradeRequest};

use crate::cli::{Cli, Command};
use crate::config::EnforcerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config: EnforcerConfig = match &cli.config {
        Some(path) => lic_config::load_toml(path)?,
        None => EnforcerConfig::default(),
    };
    logging::setup(&config.logging, cli.log_filter.clone());

    let agent = Arc::new(Agent::new(
        AgentConfig {
            install_dir: config.install_dir.clone(),
            issuer_base_url: config.issuer_base_url.clone(),
            revalidation_interval: config.revalidation_interval(),
            heartbeat_interval: config.heartbeat_interval(),
            required_service: config.required_service.clone(),
        },
        LoggingSupervisor,
    )?);

    match cli.command.unwrap_or(Command::Run) {
        Command::Activate { product_key } => activate(&agent, &config, &product_key).await,
        Command::Upgrade { new_tier, additional_days } => {
            upgrade(&agent, new_tier, additional_days).await
        }
        Command::Run => run(agent, &config).await,
    }
}

/// Compute (and, on first run, pin) this host's fingerprint, the way
/// [`Agent::startup_check`] does internally, but surfaced here so the
/// one-shot `activate`/`upgrade` subcommands can use it before a bundle
/// exists for `startup_check` to validate.
fn local_fingerprint(agent: &Agent<LoggingSupervisor>) -> anyhow::Result<String> {
    let hostname = RealProbes.hostname().unwrap_or_else(|| "unknown".to_string());
    let outcome = check_and_pin(&RealProbes, &agent.bundle().machine_id_path(), &hostname, || {
        Utc::now().to_rfc3339()
    })?;
    match outcome {
        PinOutcome::FirstPin { fingerprint } | PinOutcome::Match { fingerprint } => Ok(fingerprint),
        PinOutcome::Mismatch { pinned, computed } => {
            anyhow::bail!("hardware fingerprint mismatch: pinned {pinned}, computed {computed}")
        }
    }
}

async fn activate(agent: &Agent<LoggingSupervisor>, config: &EnforcerConfig, product_key: &str) -> anyhow::Result<()> {
    let fingerprint = local_fingerprint(agent)?;
    let hostname = RealProbes.hostname().unwrap_or_else(|| "unknown".to_string());
    let os_info = format!("{} {}", std::env::consts::OS, std::env::consts::ARCH);

    let response = agent
        .client()
        .activate(&ActivateRequest {
            product_key: product_key.to_string(),
            machine_fingerprint: fingerprint.clone(),
            hostname,
            os_info,
            app_version: config.app_version.clone(),
        })
        .await?;

    if !response.success {
        anyhow::bail!("activation refused: {}", response.reason.as_str());
    }
    let bundle = response
        .bundle
        .ok_or_else(|| anyhow::anyhow!("Issuer reported success but sent no bundle"))?;
    agent.bundle().write(&bundle, &fingerprint)?;
    println!(
        "activated: tier={} services={:?}",
        response.tier.unwrap_or_default(),
        response.services_enabled.unwrap_or_default()
    );
    Ok(())
}

async fn upgrade(
    agent: &Agent<LoggingSupervisor>,
    new_tier: Option<String>,
    additional_days: Option<u32>,
) -> anyhow::Result<()> {
    let fingerprint = local_fingerprint(agent)?;
    let response = agent
        .client()
        .upgrade(&UpgradeRequest {
            machine_fingerprint: fingerprint.clone(),
            new_tier,
            additional_days,
            new_machine_limit: None,
            additional_services: None,
            new_image_tags: None,
        })
        .await?;

    if !response.success {
        anyhow::bail!("upgrade refused (was {} machine known to the Issuer?)", fingerprint);
    }
    let bundle = response
        .bundle
        .ok_or_else(|| anyhow::anyhow!("Issuer reported success but sent no bundle"))?;
    agent.bundle().write(&bundle, &fingerprint)?;
    println!("upgraded: {} -> {}", response.old_tier, response.new_tier);
    Ok(())
}

async fn run(agent: Arc<Agent<LoggingSupervisor>>, config: &EnforcerConfig) -> anyhow::Result<()> {
    let state = agent.startup_check().await?;
    tracing::info!(?state, "startup check complete");

    agent.start_background_loop();

    let app = http::router(Arc::clone(&agent));
    tracing::info!(addr = %config.protected_listen_addr, "serving protected-port status/error page");
    let listener = tokio::net::TcpListener::bind(&config.protected_listen_addr).await?;
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
