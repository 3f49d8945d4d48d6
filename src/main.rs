//! Dashboard Feed — Entry Point
//!
//! Initializes configuration, logging, the provider chain and the
//! scheduled feed session. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (first CLI arg, default `config.toml`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create Prometheus metrics
//! 4. Build provider chain (Birdeye → CoinGecko)
//! 5. Create PriceFeed seeded with synthetic history
//! 6. Start FeedSession (polling / synthetic / paused)
//! 7. Spawn feed server (/live, /ready, /snapshot, /refresh, /session, /metrics)
//! 8. Wait for SIGINT → graceful shutdown (teardown→stop→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use dashboard_feed::adapters::metrics::{FeedMetrics, FeedServer};
use dashboard_feed::adapters::providers::build_sources;
use dashboard_feed::config::loader::load_config;
use dashboard_feed::usecases::{FeedSession, FeedSettings, PriceFeed, ScheduleConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        providers = config.providers.len(),
        symbols = config.symbols.len(),
        connected = config.session.connected,
        "Starting dashboard price feed"
    );

    // ── 3. Metrics ──────────────────────────────────────────
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);

    // ── 4. Provider chain ───────────────────────────────────
    let sources = build_sources(&config).context("Failed to build provider chain")?;

    // ── 5. Price feed ───────────────────────────────────────
    let feed = Arc::new(PriceFeed::new(
        config.symbols.clone(),
        sources,
        FeedSettings::from_config(&config.feed),
        Arc::clone(&metrics),
    ));

    // ── 6. Feed session ─────────────────────────────────────
    let (connected_tx, connected_rx) = watch::channel(config.session.connected);
    let connected_tx = Arc::new(connected_tx);
    let session = FeedSession::start(
        Arc::clone(&feed),
        ScheduleConfig::from_config(&config.feed),
        connected_rx,
    );

    // ── 7. Feed server ──────────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let server_handle = if config.server.enabled {
        let server = FeedServer::new(
            Arc::clone(&feed),
            session.trigger(),
            Arc::clone(&connected_tx),
            Arc::clone(&metrics),
            config.server.bind_address.clone(),
        );
        let server_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Feed server failed");
            }
        }))
    } else {
        None
    };

    info!("Feed session running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("SIGINT received, initiating graceful shutdown");

    // 1. Tear down the feed and stop the session task
    session.stop().await;

    // 2. Stop the server (up to 5s)
    let _ = shutdown_tx.send(());
    if let Some(handle) = server_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
