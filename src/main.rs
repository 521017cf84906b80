//! Signal Hub server entry point.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use signal_hub::adapters::http;
use signal_hub::adapters::websocket::{ClientSettings, EventBridge, Hub, WebSocketState};
use signal_hub::adapters::NatsEventSource;
use signal_hub::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        event_bus = %config.event_bus.url,
        "Starting {}",
        http::SERVICE_NAME
    );

    let (hub, hub_task) = Hub::spawn(config.hub.overflow_policy);

    let source = Arc::new(NatsEventSource::from_config(&config.event_bus)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bridge = EventBridge::new(source, hub.clone(), config.event_bus.reconnect_backoff());
    let bridge_task = tokio::spawn(bridge.run(shutdown_rx));

    let ws_state = WebSocketState::new(hub.clone(), ClientSettings::from(&config.hub));
    let app = http::router(ws_state.clone(), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    tracing::info!("  GET /         - Service info");
    tracing::info!("  GET /health   - Health check");
    tracing::info!("  GET /ws       - Dashboard stream");
    tracing::info!("  GET /ws/stats - Connection stats");

    let shutdown_hub = hub.clone();
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Received shutdown signal, draining clients");
            shutdown_hub.shutdown();
            let _ = shutdown_tx.send(true);
        })
        .await;

    // One deadline covers open sockets, the bridge and the hub loop.
    let grace = config.server.shutdown_grace();
    let deadline = tokio::time::Instant::now() + grace;
    ws_state.drain(grace).await;
    let stopped = tokio::time::timeout_at(deadline, async {
        let _ = bridge_task.await;
        let _ = hub_task.await;
    })
    .await;
    if stopped.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Background tasks did not stop in time");
    }

    tracing::info!("Shutdown complete");
    server_result?;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
