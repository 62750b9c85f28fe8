use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use sop_agent::core::config::{AppPaths, Settings};
use sop_agent::core::logging;
use sop_agent::server;
use sop_agent::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    let paths = AppPaths::from_settings(&settings);
    logging::init(&paths, &settings.log_level);

    let bind_addr = settings.bind_addr();
    let state = AppState::initialize(settings, paths).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!(
        "{} listening on {} (tenants: {})",
        state.settings.agent_name,
        addr,
        state.config.tenant_ids()?.join(", ")
    );

    let app: Router = server::router::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down");
}
