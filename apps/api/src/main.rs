mod config;
mod context;
mod errors;
mod latex;
mod llm_client;
mod models;
mod pipeline;
mod reconstruct;
mod rewrite;
mod routes;
mod state;
mod tailor;

use anyhow::Result;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::rewrite::build_backend;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on invalid env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Tailor API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );
    info!(
        "Rewrite: concurrency={}, timeout={:?}, failure policy={:?}",
        config.rewrite_concurrency, config.rewrite_timeout, config.failure_policy
    );

    // Rewrite backend: LLM with a key, identity without
    let backend = build_backend(&config)?;

    // Outbound client for job descriptions given by URL
    let http = reqwest::Client::builder()
        .user_agent(concat!("tailor-api/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let state = AppState {
        backend,
        http,
        config: config.clone(),
    };

    let cors = if config.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl+c: {e}");
        std::future::pending::<()>().await;
    }
}
