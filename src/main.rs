use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use docchat::core::config::{redacted, AppPaths, ConfigScope, ConfigService};
use docchat::core::logging;
use docchat::server::router::router;
use docchat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths.clone())
        .load(ConfigScope::Server)
        .context("Invalid configuration")?;
    let log_dir = config
        .logging
        .dir
        .clone()
        .unwrap_or_else(|| paths.log_dir.clone());
    logging::init(&log_dir, "docchat-backend.log", &config.logging.level);
    tracing::info!(config = %redacted(&config), "configuration loaded");

    let config = Arc::new(config);
    let state = AppState::initialize(paths, config.clone())?;
    spawn_session_sweeper(
        state.clone(),
        Duration::from_secs(config.retrieval.session_ttl_secs),
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

fn spawn_session_sweeper(state: Arc<AppState>, ttl: Duration) {
    let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.chat.evict_idle(ttl).await;
            if evicted > 0 {
                tracing::info!(evicted, "dropped idle chat sessions");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
