//! Graphmind - document knowledge-graph service
//!
//! Ingests documents, builds a concept graph with traceable provenance,
//! and answers natural-language questions against it over a REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use graphmind::config::ServerConfig;
use graphmind::handlers::router::build_router;
use graphmind::handlers::state::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    config.log_summary();

    let state = Arc::new(AppContext::new(config.clone()).context("initializing application state")?);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port configuration")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {e}");
        return;
    }
    info!("Shutdown signal received, draining requests");
}
