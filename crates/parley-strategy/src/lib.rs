//! Parley pricing strategies
//!
//! A strategy turns `(item, bid, reputation)` into a [`Verdict`]. Strategies
//! are pure with respect to their inputs plus their own configuration: they
//! never touch the deal store or the chain. One strategy is selected at
//! process start via the [`factory`]; switching requires a restart.

pub mod factory;
pub mod guard;
pub mod llm;
pub mod rule;

use async_trait::async_trait;
use thiserror::Error;

use parley_types::{Item, Verdict};

pub use factory::{build_strategy, LlmSettings, StrategyConfig};
pub use guard::DecisionGuard;
pub use llm::LlmStrategy;
pub use rule::RuleStrategy;

/// Errors a strategy can surface. These become STRATEGY_UNAVAILABLE at the
/// engine boundary - never a silent accept or reject.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy network error: {0}")]
    Network(String),

    #[error("strategy returned an invalid decision: {0}")]
    InvalidResponse(String),

    #[error("strategy configuration error: {0}")]
    Configuration(String),
}

/// The pricing decision protocol.
#[async_trait]
pub trait PricingStrategy: Send + Sync {
    /// Human-readable strategy name for logs.
    fn name(&self) -> &'static str;

    /// Evaluate a single bid against an item.
    async fn evaluate(
        &self,
        item: &Item,
        bid: f64,
        reputation: Option<f64>,
        request_id: &str,
    ) -> Result<Verdict, StrategyError>;
}
