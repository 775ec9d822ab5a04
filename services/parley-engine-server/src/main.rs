//! Parley Engine Server
//!
//! The private tier: pricing strategy dispatch, the locked-deal lifecycle,
//! and on-chain payment verification, served over a binary RPC surface the
//! edge consumes.
//!
//! ```bash
//! # Development with defaults (rule strategy, crypto off)
//! parley-engine-server
//!
//! # Custom config file plus environment overrides
//! PARLEY__CRYPTO__CRYPTO_ENABLED=true parley-engine-server --config config/engine.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parley_chain::{PriceConverter, RateOptions, ReceivingWallet, SolanaConfig, SolanaWatcher};
use parley_crypto::SecretBox;
use parley_db::Database;
use parley_engine::{rpc_router, DealService, EngineState, NegotiationService};
use parley_strategy::{build_strategy, LlmSettings, StrategyConfig};
use parley_types::CryptoCurrency;

use crate::config::EngineServerConfig;

/// Parley engine - negotiation and settlement core
#[derive(Parser, Debug)]
#[command(name = "parley-engine-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<String>,

    /// RPC listen address override
    #[arg(long, env = "PARLEY_ENGINE_RPC_ADDR")]
    addr: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

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

    let mut server_config = EngineServerConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        server_config.server.engine_rpc_addr = addr;
    }
    if let Some(url) = args.database_url {
        server_config.database.postgres_url = url;
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
        crypto_enabled = server_config.crypto.crypto_enabled,
        strategy = %server_config.strategy.strategy,
        "Starting Parley engine"
    );

    // Deal/catalog store
    let db = Arc::new(Database::connect(&server_config.database).await?);
    if server_config.server.run_migrations {
        db.migrate().await?;
    }

    // Process-wide pricing strategy
    let strategy = build_strategy(&StrategyConfig {
        strategy: server_config.strategy.strategy.clone(),
        high_value_threshold: server_config.strategy.high_value_threshold,
        business_type: server_config.strategy.business_type.clone(),
        llm: LlmSettings {
            base_url: server_config.strategy.llm_base_url.clone(),
            api_key: server_config.strategy.llm_api_key.clone(),
            temperature: server_config.strategy.llm_temperature,
        },
    })
    .map_err(|e| anyhow::anyhow!("strategy construction failed: {e}"))?;
    tracing::info!(strategy = strategy.name(), "strategy_selected");

    // Settlement stack, only when the toggle is on
    let deals = if server_config.crypto.crypto_enabled {
        Some(Arc::new(build_deal_service(&server_config, &db)?))
    } else {
        tracing::info!("crypto settlement disabled; accepted offers reveal immediately");
        None
    };

    let negotiation = NegotiationService::new(db.item_repo(), strategy, deals);
    let state = Arc::new(EngineState {
        negotiation,
        db: db.clone(),
    });

    let app = rpc_router(state)
        .route("/healthz", axum::routing::get(parley_engine::rpc::healthz));

    if server_config.metrics.enabled {
        start_metrics_server(server_config.metrics.port)?;
    }

    let addr = server_config.server.socket_addr()?;
    tracing::info!(addr = %addr, "Engine RPC listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("Engine shutdown complete");
    Ok(())
}

/// Assemble the deal service from the crypto configuration.
fn build_deal_service(
    config: &EngineServerConfig,
    db: &Arc<Database>,
) -> anyhow::Result<DealService> {
    let crypto = &config.crypto;

    let receiving_key = crypto
        .receiving_wallet_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("receiving_wallet_key is required when crypto_enabled"))?;
    let secret_key = crypto
        .secret_encryption_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("secret_encryption_key is required when crypto_enabled"))?;

    let currency: CryptoCurrency = crypto
        .crypto_currency
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid crypto_currency: {e}"))?;

    let wallet = ReceivingWallet::from_base58(receiving_key, crypto.chain_network.clone())
        .map_err(|e| anyhow::anyhow!("receiving wallet: {e}"))?;
    tracing::info!(
        wallet_address = wallet.address(),
        network = wallet.network(),
        currency = %currency,
        "crypto_provider_initialized"
    );

    let watcher = SolanaWatcher::new(
        wallet,
        SolanaConfig {
            rpc_url: crypto.chain_rpc_url.clone(),
            stable_token_mint: crypto.stable_token_mint.clone(),
            ..Default::default()
        },
    );

    let converter = PriceConverter::new(RateOptions {
        use_fixed_rates: crypto.use_fixed_rates,
        usd_per_native: crypto.usd_per_native,
        usd_per_stable: crypto.usd_per_stable,
    })
    .map_err(|e| anyhow::anyhow!("price converter: {e}"))?;

    let secrets =
        SecretBox::new(secret_key).map_err(|e| anyhow::anyhow!("secret_encryption_key: {e}"))?;

    Ok(DealService::new(
        db.deal_repo(),
        Arc::new(watcher),
        converter,
        secrets,
        currency,
        crypto.deal_ttl_seconds,
    ))
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
    fn cli_parses_addr_override() {
        let args = Args::parse_from(["parley-engine-server", "--addr", "127.0.0.1:7200"]);
        assert_eq!(args.addr.as_deref(), Some("127.0.0.1:7200"));
    }

    #[test]
    fn crypto_without_wallet_key_fails_fast() {
        let mut config = EngineServerConfig::default();
        config.crypto.crypto_enabled = true;

        // Can't build a Database here; exercise just the validation ordering
        // by checking the key requirement directly.
        assert!(config.crypto.receiving_wallet_key.is_none());
        assert!(config.crypto.secret_encryption_key.is_none());
    }
}
