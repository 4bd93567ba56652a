// =============================================================================
// TWAP Dashboard - Main Entry Point
// =============================================================================
//
// Serves the JSON API behind the crypto TWAP dashboard. Each request pages
// through MEXC klines for the selected pairs and returns the TWAP over the
// trailing day window together with the series it was computed from.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod config;
mod dashboard;
mod exchange;
mod market_data;
mod twap;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::DashboardConfig;
use crate::exchange::MexcClient;

const CONFIG_PATH: &str = "dashboard_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("TWAP dashboard starting up");

    let mut config = DashboardConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        DashboardConfig::default()
    });
    config.apply_env_overrides();

    info!(
        symbols = ?config.symbols,
        default_timeframe = %config.default_timeframe,
        default_days = config.default_lookback_days,
        "Configured dashboard pairs"
    );

    // ── 2. Exchange client (built once, shared by every request) ─────────
    let client = MexcClient::new(
        config.exchange_base_url.clone(),
        config.request_timeout(),
        config.min_request_interval(),
    )?;
    info!(client = ?client, "Exchange client ready");

    // ── 3. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(client)));

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("TWAP dashboard shut down complete.");
    Ok(())
}
