//! Gateway service entry point.
//!
//! Connects to the scoreboard, derives stats views, and serves them to
//! WebSocket clients.

use anyhow::{Context, Result};
use common::{ControlCommand, WsManager};
use gateway::{create_router, AppState, ClientRegistry, GatewayConfig, UpdateRouter};
use metrics_exporter_prometheus::PrometheusBuilder;
use scoreboard::{ScoreboardConnector, ScoreboardHandler};
use stats::StatsEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const STALE_CLIENT_MS: i64 = 120_000;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Gateway service");

    let config = GatewayConfig::from_env()?;
    config.log();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()
        .context("Failed to start Prometheus exporter")?;
    info!("Prometheus metrics server started on port {}", config.metrics_port);

    // Derivers register their topics and interests before the first connect
    let engine = StatsEngine::with_default_derivers()?;
    let mut connector = ScoreboardConnector::new(config.scoreboard_url.clone());
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    engine.install(&mut connector, update_tx)?;
    info!("Views: {:?}", engine.views());
    let engine = Arc::new(engine);

    // Upstream connection
    let upstream = Arc::new(ScoreboardHandler::new(connector));
    let (command_tx, command_rx) = mpsc::channel::<ControlCommand>(16);
    let ws_manager = WsManager::new(upstream.clone(), config.ws_manager_config(), command_rx);
    let upstream_handle = tokio::spawn(async move {
        if let Err(e) = ws_manager.run().await {
            error!("Upstream error: {:?}", e);
        }
    });

    let registry = Arc::new(ClientRegistry::new());

    // Clients answer our pings; one silent for several intervals is gone
    let reaper_registry = registry.clone();
    let reaper_handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(STALE_CHECK_INTERVAL);
        loop {
            tick.tick().await;
            let removed = reaper_registry.cleanup_stale_clients(STALE_CLIENT_MS);
            if removed > 0 {
                info!("Removed {} stale clients", removed);
            }
        }
    });
    let router = Arc::new(UpdateRouter::new(registry.clone(), engine));

    // Create shutdown channel for router
    let (router_shutdown_tx, router_shutdown_rx) = mpsc::channel(1);

    let router_clone = router.clone();
    let router_handle = tokio::spawn(async move {
        if let Err(e) = router_clone.run(update_rx, router_shutdown_rx).await {
            error!("Router error: {:?}", e);
        }
    });

    let state = Arc::new(AppState {
        registry,
        router,
        upstream,
    });
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down upstream connection...");
    let _ = command_tx.send(ControlCommand::Shutdown).await;
    // Shutdown is only observed while connected; a manager sleeping in backoff is aborted
    let abort = upstream_handle.abort_handle();
    if tokio::time::timeout(Duration::from_secs(2), upstream_handle).await.is_err() {
        warn!("Upstream did not stop in time, aborting");
        abort.abort();
    }

    reaper_handle.abort();

    info!("Shutting down router...");
    let _ = router_shutdown_tx.send(()).await;
    let _ = router_handle.await;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
