//! Stock Board Binary
//!
//! Mounts one live board and serves it over HTTP.
//!
//! # Usage
//!
//! ```bash
//! STOCK_API_URL=http://localhost:8000 cargo run --bin stock-board
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCK_API_URL`: Base URL of the company API
//!
//! ## Optional
//! - `REALTIME_API_URL`: Base URL of the realtime broadcaster (default: `STOCK_API_URL`)
//! - `STOCK_BOARD_SNAPSHOT_PATH`: Snapshot path (default: /api/all-companies)
//! - `STOCK_BOARD_SNAPSHOT_LIMIT`: Snapshot `limit` parameter (default: 1500)
//! - `STOCK_BOARD_HTTP_TIMEOUT_SECS`: Snapshot timeout (default: 10)
//! - `STOCK_BOARD_EVENT_CAPACITY`: Stream event buffer (default: 1024)
//! - `STOCK_BOARD_GATE_CHECK_SECS`: Market-hours re-check interval (default: 30)
//! - `STOCK_BOARD_ROW_HEIGHT` / `STOCK_BOARD_OVERSCAN` / `STOCK_BOARD_VIEWPORT_HEIGHT`
//! - `STOCK_BOARD_SEARCH_DEBOUNCE_MS`: Search quiet period (default: 300)
//! - `STOCK_BOARD_HTTP_PORT`: HTTP port (default: 8083)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stock_board::application::ports::{MarketClock, SystemClock};
use stock_board::application::services::{BoardSession, SessionConfig, run_market_gate};
use stock_board::infrastructure::config::BoardConfig;
use stock_board::infrastructure::http::{BoardServer, BoardServerState};
use stock_board::infrastructure::metrics::PrometheusSessionMetrics;
use stock_board::infrastructure::realtime::{PriceStreamClient, PriceStreamClientConfig};
use stock_board::infrastructure::snapshot::{HttpSnapshotSource, HttpSnapshotSourceConfig};
use stock_board::infrastructure::telemetry;
use stock_board::init_metrics;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How long the HTTP server gets to drain after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting stock board");

    let _metrics_handle = init_metrics().context("installing Prometheus recorder")?;

    let config = BoardConfig::from_env().context("loading configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let source = HttpSnapshotSource::new(HttpSnapshotSourceConfig::from(&config.api))
        .context("building snapshot client")?;
    let stream = PriceStreamClient::new(PriceStreamClientConfig::new(
        config.api.realtime_url.clone(),
    ));
    let clock: Arc<dyn MarketClock> = Arc::new(SystemClock);

    let session = Arc::new(BoardSession::mount(
        Arc::new(source),
        Arc::new(stream),
        clock.as_ref(),
        SessionConfig {
            search_debounce: config.view.search_debounce,
            event_capacity: config.stream.event_capacity,
            metrics: Arc::new(PrometheusSessionMetrics),
            ..SessionConfig::default()
        },
    ));

    let gate_handle = tokio::spawn(run_market_gate(
        Arc::clone(&session),
        Arc::clone(&clock),
        config.stream.gate_check_interval,
        shutdown_token.child_token(),
    ));

    let server_state = Arc::new(BoardServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&session),
        config.view.clone(),
        clock,
    ));
    let server = BoardServer::new(
        config.server.http_port,
        server_state,
        shutdown_token.clone(),
    );
    let mut server_handle = tokio::spawn(server.run());

    tracing::info!("Stock board ready");

    tokio::select! {
        () = await_shutdown_signal() => {}
        result = &mut server_handle => {
            session.unmount();
            shutdown_token.cancel();
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("board server failed"),
                Err(e) => Err(e).context("board server task panicked"),
            };
        }
    }

    tracing::info!("Graceful shutdown started");
    session.unmount();
    shutdown_token.cancel();
    let _ = gate_handle.await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => tracing::info!("Stock board stopped"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Board server exited with error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Board server task panicked"),
        Err(_) => tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Board server did not stop in time"
        ),
    }

    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &BoardConfig) {
    tracing::info!(
        snapshot_url = %config.api.snapshot_url(),
        snapshot_limit = config.api.snapshot_limit,
        http_port = config.server.http_port,
        "Configuration loaded"
    );
    tracing::debug!(
        realtime_url = %config.api.realtime_url,
        row_height = config.view.row_height,
        overscan = config.view.overscan,
        debounce_ms = u64::try_from(config.view.search_debounce.as_millis()).unwrap_or(u64::MAX),
        "Board settings"
    );
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGTERM or Ctrl+C.
async fn await_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
