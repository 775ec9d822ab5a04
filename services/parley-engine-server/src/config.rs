//! Engine server configuration
//!
//! Layered: optional config file, then `PARLEY_`-prefixed environment
//! variables, then CLI overrides. Every section denies unknown keys, so a
//! typo in an option name fails at load time instead of being ignored.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use parley_db::DatabaseConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    /// Catalog/deal store wiring.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub strategy: StrategySettings,

    #[serde(default)]
    pub crypto: CryptoSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Address the binary RPC listens on.
    #[serde(default = "default_rpc_addr")]
    pub engine_rpc_addr: String,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Apply migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            engine_rpc_addr: default_rpc_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            run_migrations: true,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.engine_rpc_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid engine_rpc_addr: {e}"))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategySettings {
    /// `rule` or an LLM model tag.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold: f64,

    #[serde(default = "default_business_type")]
    pub business_type: String,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            high_value_threshold: default_high_value_threshold(),
            business_type: default_business_type(),
            llm_base_url: default_llm_base_url(),
            llm_api_key: None,
            llm_temperature: default_llm_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CryptoSettings {
    /// Gate for all payment-lock behavior.
    #[serde(default)]
    pub crypto_enabled: bool,

    /// `SOL` or `USDC`.
    #[serde(default = "default_crypto_currency")]
    pub crypto_currency: String,

    #[serde(default = "default_deal_ttl")]
    pub deal_ttl_seconds: i64,

    /// Base58 receiving key; required when `crypto_enabled`. Never logged.
    #[serde(default)]
    pub receiving_wallet_key: Option<String>,

    #[serde(default = "default_chain_rpc_url")]
    pub chain_rpc_url: String,

    #[serde(default = "default_chain_network")]
    pub chain_network: String,

    #[serde(default = "default_stable_mint")]
    pub stable_token_mint: String,

    /// Base64url 32-byte key for reservation-code ciphertext; required when
    /// `crypto_enabled`. Never logged.
    #[serde(default)]
    pub secret_encryption_key: Option<String>,

    #[serde(default = "default_true")]
    pub use_fixed_rates: bool,

    #[serde(default = "default_usd_per_native")]
    pub usd_per_native: f64,

    #[serde(default = "default_usd_per_stable")]
    pub usd_per_stable: f64,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            crypto_enabled: false,
            crypto_currency: default_crypto_currency(),
            deal_ttl_seconds: default_deal_ttl(),
            receiving_wallet_key: None,
            chain_rpc_url: default_chain_rpc_url(),
            chain_network: default_chain_network(),
            stable_token_mint: default_stable_mint(),
            secret_encryption_key: None,
            use_fixed_rates: true,
            usd_per_native: default_usd_per_native(),
            usd_per_stable: default_usd_per_stable(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_rpc_addr() -> String {
    "0.0.0.0:7100".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_strategy() -> String {
    "rule".to_string()
}

fn default_high_value_threshold() -> f64 {
    1000.0
}

fn default_business_type() -> String {
    "hotel".to_string()
}

fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_temperature() -> f32 {
    0.2
}

fn default_crypto_currency() -> String {
    "SOL".to_string()
}

fn default_deal_ttl() -> i64 {
    3600
}

fn default_chain_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_chain_network() -> String {
    "mainnet-beta".to_string()
}

fn default_stable_mint() -> String {
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string()
}

fn default_usd_per_native() -> f64 {
    100.0
}

fn default_usd_per_stable() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9101
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Loading
// =============================================================================

impl EngineServerConfig {
    /// Load from an optional file plus `PARLEY_`-prefixed environment.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PARLEY")
                .separator("__")
                .try_parsing(true),
        );

        let loaded = builder.build()?;
        let config: EngineServerConfig = loaded.try_deserialize()?;
        Ok(config)
    }
}

impl Default for EngineServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseConfig::default(),
            strategy: StrategySettings::default(),
            crypto: CryptoSettings::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_crypto_off() {
        let config = EngineServerConfig::default();
        assert!(!config.crypto.crypto_enabled);
        assert_eq!(config.crypto.deal_ttl_seconds, 3600);
        assert_eq!(config.strategy.strategy, "rule");
        assert_eq!(config.strategy.high_value_threshold, 1000.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
            [server]
            engine_rpc_addr = "127.0.0.1:7100"
            definitely_not_an_option = true
        "#;
        let loaded = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap();
        let result: Result<EngineServerConfig, _> = loaded.try_deserialize();
        assert!(result.is_err());
    }
}
