//! Strategy construction
//!
//! A small factory table maps the `strategy` configuration value to a
//! constructor. Exact matches hit the table; any other value is treated as an
//! LLM model tag. New variants register a constructor here - no inheritance,
//! no runtime switching.

use std::sync::Arc;

use crate::rule::DEFAULT_HIGH_VALUE_THRESHOLD;
use crate::{LlmStrategy, PricingStrategy, RuleStrategy, StrategyError};

/// Configuration for strategy construction.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// `rule` or an LLM model tag (e.g. `mistral-large-latest`).
    pub strategy: String,
    pub high_value_threshold: f64,
    /// Business persona fed to the LLM prompt.
    pub business_type: String,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy: "rule".to_string(),
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            business_type: "hotel".to_string(),
            llm: LlmSettings {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                temperature: 0.2,
            },
        }
    }
}

type Constructor = fn(&StrategyConfig) -> Result<Arc<dyn PricingStrategy>, StrategyError>;

/// Named constructors. Tags not present here are LLM model tags.
const REGISTRY: &[(&str, Constructor)] = &[("rule", build_rule)];

fn build_rule(config: &StrategyConfig) -> Result<Arc<dyn PricingStrategy>, StrategyError> {
    Ok(Arc::new(RuleStrategy::new(config.high_value_threshold)))
}

fn build_llm(config: &StrategyConfig) -> Result<Arc<dyn PricingStrategy>, StrategyError> {
    if config.llm.base_url.is_empty() {
        return Err(StrategyError::Configuration(
            "llm base_url must be set for model-backed strategies".to_string(),
        ));
    }
    Ok(Arc::new(LlmStrategy::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.strategy.clone(),
        config.llm.temperature,
        config.business_type.clone(),
        config.high_value_threshold,
    )))
}

/// Build the process-wide strategy from configuration.
pub fn build_strategy(config: &StrategyConfig) -> Result<Arc<dyn PricingStrategy>, StrategyError> {
    for (tag, constructor) in REGISTRY {
        if *tag == config.strategy {
            return constructor(config);
        }
    }
    build_llm(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_tag_builds_rule_strategy() {
        let strategy = build_strategy(&StrategyConfig::default()).unwrap();
        assert_eq!(strategy.name(), "rule");
    }

    #[test]
    fn other_tags_build_llm_strategy() {
        let config = StrategyConfig {
            strategy: "mistral-large-latest".to_string(),
            ..Default::default()
        };
        let strategy = build_strategy(&config).unwrap();
        assert_eq!(strategy.name(), "llm");
    }

    #[test]
    fn llm_without_base_url_is_a_config_error() {
        let mut config = StrategyConfig {
            strategy: "gpt-4o".to_string(),
            ..Default::default()
        };
        config.llm.base_url.clear();
        assert!(build_strategy(&config).is_err());
    }
}
