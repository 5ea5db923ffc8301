//! Kitchen gateway entry point.
//!
//! Serves the order feed over WebSocket and the login/order routes over HTTP.

use anyhow::Result;
use kitchen_gateway::{create_router, AppState, GatewayConfig, TokenSweeper};
use kitchen_store::{
    MemoryOrderSource, MemoryTokenLedger, OrderSource, RedisOrderSource, RedisTokenLedger,
    TokenLedger,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Kitchen gateway");

    let config = GatewayConfig::from_env()?;

    info!("Configuration:");
    info!("  HTTP_PORT: {}", config.http_port);
    info!("  METRICS_PORT: {}", config.metrics_port);
    info!(
        "  REDIS_URL: {}",
        config.redis_url.as_deref().unwrap_or("(in-memory)")
    );
    info!("  TICK_INTERVAL_MS: {}", config.tick_interval.as_millis());
    info!("  TOKEN_TTL_SECS: {}", config.token_ttl.as_secs());
    info!(
        "  TOKEN_SWEEP_INTERVAL_SECS: {}",
        config.token_sweep_interval.as_secs()
    );
    if config.credential_hash.is_none() {
        warn!("CREDENTIAL_HASH not set, login is disabled");
    }

    // Start Prometheus metrics server
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    info!(
        "Prometheus metrics server started on port {}",
        config.metrics_port
    );

    let (source, ledger): (Arc<dyn OrderSource>, Arc<dyn TokenLedger>) = match &config.redis_url
    {
        Some(url) => {
            info!("Using Redis stores at {}", url);
            (
                Arc::new(RedisOrderSource::new(url)?),
                Arc::new(RedisTokenLedger::new(url)?),
            )
        }
        None => {
            warn!("REDIS_URL not set, orders and tokens are kept in memory");
            (
                Arc::new(MemoryOrderSource::new()),
                Arc::new(MemoryTokenLedger::new()),
            )
        }
    };

    // Spawn token sweeper
    let (sweeper_shutdown_tx, sweeper_shutdown_rx) = mpsc::channel(1);
    let sweeper = TokenSweeper::new(ledger.clone(), config.token_sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(sweeper_shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = Arc::new(AppState::new(source, ledger, config));
    let app = create_router(state);

    // Start HTTP server
    let listener = TcpListener::bind(addr).await?;
    info!("Kitchen gateway listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down token sweeper...");
    let _ = sweeper_shutdown_tx.send(()).await;
    let _ = sweeper_handle.await;

    info!("Kitchen gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
