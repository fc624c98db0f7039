//! Pipevisor Agent
//!
//! Runs pipeline scripts through an external executable and exposes them
//! over HTTP.
//!
//! Architecture:
//! - Configuration: command line flags with environment fallbacks
//! - Engine: pipeline lifecycle, registry, identifiers and capabilities
//! - Sampler: periodic per-core CPU utilization
//! - API: axum router over the shared engine
//!
//! At startup the agent queries the executable for its capabilities, starts
//! CPU sampling, binds the REST API and optionally notifies a manager.

mod api;
mod config;
mod engine;
mod host_info;
mod notify;
mod sampler;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::{Args, Config};
use crate::engine::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipevisor_agent=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pipevisor Agent");

    let config = Config::from_args(Args::parse())?;
    config.validate()?;
    info!("Using pipeline executable {}", config.executable.display());

    let engine = Engine::initialize(
        config.executable.clone(),
        config.tags.clone(),
        config.cpu_interval,
    )
    .await
    .context("Failed to load pipeline capabilities")?;
    info!(
        "Executable supports {} processing steps",
        engine.capabilities().len()
    );

    let app = api::create_router(AppState {
        engine,
        default_delay: config.default_delay,
        max_delay: config.max_delay,
    });

    info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    if let Some(url) = config.manager_url.clone() {
        let timeout = config.notify_timeout;
        tokio::spawn(async move {
            if let Err(e) = notify::notify_manager(&url, timeout).await {
                error!("{:#}", e);
                std::process::exit(1);
            }
        });
    }

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
