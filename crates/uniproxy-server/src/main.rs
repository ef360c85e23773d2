//! Caching reverse proxy for the Universalis market-price API.
//!
//! The binary wires the pieces together: env configuration, the dual-tier
//! SWR cache, the sliding-window rate limiter, the upstream client, and the
//! axum router that always answers with CORS headers.

mod config;
mod error;
mod handlers;
mod middleware;
mod state;
mod upstream;
mod validate;


use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        environment = config.environment.as_str(),
        upstream = %config.upstream_base,
        "starting uniproxy"
    );

    let bind_addr = config.bind_addr;
    let state = match AppState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to initialize");
            std::process::exit(1);
        }
    };

    let app = handlers::router(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %bind_addr, "listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
