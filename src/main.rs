//! # Pokedex Gateway - Main Entry Point
//!
//! Loads configuration, wires cache, upstream client and list service
//! together, then serves the public and admin APIs until SIGINT or SIGTERM.
//!
//! The configuration path comes from the first argument or `POKEDEX_CONFIG`.
//! Without either the built-in defaults are used, with `POKEDEX_*`
//! environment overrides applied on top.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pokedex_gateway::caching::{CacheAdminState, CacheManager};
use pokedex_gateway::observability::{init_logging, metrics::describe_metrics};
use pokedex_gateway::{PokeApiClient, PokedexConfig, PokedexServer, PokemonService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("POKEDEX_CONFIG").ok())
        .map(PathBuf::from);

    let config = PokedexConfig::load(config_path.as_deref())
        .await
        .context("Failed to load configuration")?;

    init_logging(&config.logging, &config.server.service_name)
        .context("Failed to initialize logging")?;
    describe_metrics();

    info!("Starting {} v{}", config.server.service_name, env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file given, using defaults"),
    }

    let server = build_server(&config).await?;

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let mut server_handle = tokio::spawn(async move { server.start(server_shutdown).await });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining connections");
            shutdown.cancel();
        }
        result = &mut server_handle => {
            // The server stopped on its own, which only happens on error
            match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => return Err(anyhow::anyhow!("Server task failed: {}", e)),
            }
        }
    }

    server_handle
        .await
        .context("Server task failed")?
        .context("Server error during shutdown")?;

    info!("Pokedex gateway shutdown complete");
    Ok(())
}

/// Cache manager -> PokeAPI client -> list service -> HTTP servers
async fn build_server(config: &PokedexConfig) -> anyhow::Result<PokedexServer> {
    let cache = CacheManager::new(config.cache.clone())
        .await
        .context("Failed to initialize cache")?;
    info!(
        backend = cache.backend_name(),
        ttl = %humantime::format_duration(cache.default_ttl()),
        "Cache ready"
    );

    let client = Arc::new(
        PokeApiClient::new(&config.upstream, Arc::new(cache))
            .context("Failed to build PokeAPI client")?,
    );
    let service = Arc::new(PokemonService::new(client.clone(), config.aggregator.clone()));

    Ok(PokedexServer::new(
        &config.server,
        CacheAdminState { client, service },
    ))
}

#[cfg(unix)]
async fn shutdown_signal() {
    use signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = signal::ctrl_c() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Received Ctrl+C");
}
