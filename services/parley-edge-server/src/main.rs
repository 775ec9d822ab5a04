//! Parley Edge Server
//!
//! The public tier: verifies signed agent requests, rate-limits per
//! identity, and relays negotiations and status polls to the engine over the
//! binary RPC. Stateless - replicas share nothing but the Redis rate
//! windows.
//!
//! ```bash
//! # Development against a local engine
//! parley-edge-server
//!
//! # Shared rate limiting across replicas
//! PARLEY_EDGE__CACHE__CACHE_URL=redis://cache:6379 parley-edge-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parley_db::CacheManager;
use parley_edge::rate_limit::RateLimiter;
use parley_edge::{create_router, EdgeState};
use parley_proto::EngineClient;

use crate::config::EdgeServerConfig;

/// Parley edge - authenticated gateway for agent negotiations
#[derive(Parser, Debug)]
#[command(name = "parley-edge-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML)
    #[arg(short, long, env = "PARLEY_EDGE_CONFIG")]
    config: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PARLEY_EDGE_PORT")]
    port: Option<u16>,

    /// Engine RPC base URL
    #[arg(long, env = "PARLEY_ENGINE_RPC_ADDR")]
    engine: Option<String>,

    /// Redis URL for shared rate limiting
    #[arg(long, env = "REDIS_URL")]
    cache_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PARLEY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "PARLEY_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = EdgeServerConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(engine) = args.engine {
        server_config.engine.engine_rpc_addr = engine;
    }
    if let Some(cache_url) = args.cache_url {
        server_config.cache.cache_url = Some(cache_url);
    }
    if let Some(level) = args.log_level {
        server_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        server_config.logging.format = format;
    }

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        engine = %server_config.engine.engine_rpc_addr,
        "Starting Parley edge"
    );

    let limiter = match &server_config.cache.cache_url {
        Some(url) => {
            let cache = CacheManager::connect(url).await?;
            tracing::info!("Rate limiter backed by shared cache");
            RateLimiter::redis(cache)
        }
        None => {
            tracing::warn!(
                "No cache_url configured; using the in-process rate limiter \
                 (not shared across replicas)"
            );
            RateLimiter::in_memory()
        }
    };

    let engine = EngineClient::new(server_config.engine.engine_rpc_addr.clone());
    let state = Arc::new(EdgeState::new(engine, limiter));
    let app = create_router(state);

    if server_config.metrics.enabled {
        start_metrics_server(server_config.metrics.port)?;
    }

    let addr = server_config.server.socket_addr()?;
    tracing::info!(addr = %addr, "Edge listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("Edge shutdown complete");
    Ok(())
}

fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }

    Ok(())
}

fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(port, "Metrics exporter started");
    Ok(())
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    tracing::info!(
        timeout_secs = timeout.as_secs(),
        "Waiting for in-flight requests to complete..."
    );
    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_port_override() {
        let args = Args::parse_from(["parley-edge-server", "--port", "8080"]);
        assert_eq!(args.port, Some(8080));
    }
}
