//! Deterministic rule-based strategy
//!
//! No model, no network: a bid below the floor is countered at the floor, a
//! bid at or above it is accepted, and anything over the high-value threshold
//! is escalated to a human confirmation flow.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::info;

use parley_types::decision::{reason, HIGH_VALUE_TEMPLATE};
use parley_types::{Item, Verdict};

use crate::{PricingStrategy, StrategyError};

/// Bid value above which the rule strategy demands out-of-band confirmation.
pub const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 1000.0;

pub struct RuleStrategy {
    high_value_threshold: f64,
}

impl RuleStrategy {
    pub fn new(high_value_threshold: f64) -> Self {
        Self {
            high_value_threshold,
        }
    }
}

impl Default for RuleStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_VALUE_THRESHOLD)
    }
}

#[async_trait]
impl PricingStrategy for RuleStrategy {
    fn name(&self) -> &'static str {
        "rule"
    }

    async fn evaluate(
        &self,
        item: &Item,
        bid: f64,
        _reputation: Option<f64>,
        request_id: &str,
    ) -> Result<Verdict, StrategyError> {
        let verdict = if bid < item.floor_price {
            Verdict::Counter {
                proposed_price: item.floor_price,
                reason_code: reason::BELOW_FLOOR.to_string(),
                message: format!("That bid is below what we can accept for {}.", item.name),
            }
        } else if bid <= self.high_value_threshold {
            Verdict::Accept { price: bid }
        } else {
            let mut context = BTreeMap::new();
            context.insert("item_name".to_string(), item.name.clone());
            context.insert("price".to_string(), format!("{bid}"));
            Verdict::UiRequired {
                template_id: HIGH_VALUE_TEMPLATE.to_string(),
                context,
            }
        };

        info!(
            request_id,
            item_id = %item.id,
            bid_amount = bid,
            outcome = match &verdict {
                Verdict::Accept { .. } => "accept",
                Verdict::Counter { .. } => "counter",
                Verdict::Reject { .. } => "reject",
                Verdict::UiRequired { .. } => "ui_required",
            },
            "rule_decision_made"
        );

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_101() -> Item {
        Item {
            id: "room-101".into(),
            name: "Room 101".into(),
            base_price: 200.0,
            floor_price: 150.0,
            active: true,
        }
    }

    #[tokio::test]
    async fn bid_above_floor_is_accepted() {
        let strategy = RuleStrategy::default();
        let verdict = strategy
            .evaluate(&room_101(), 160.0, None, "req_1")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accept { price: 160.0 });
    }

    #[tokio::test]
    async fn bid_at_floor_is_accepted() {
        let strategy = RuleStrategy::default();
        let verdict = strategy
            .evaluate(&room_101(), 150.0, None, "req_2")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accept { price: 150.0 });
    }

    #[tokio::test]
    async fn bid_below_floor_is_countered_at_floor() {
        let strategy = RuleStrategy::default();
        let verdict = strategy
            .evaluate(&room_101(), 140.0, None, "req_3")
            .await
            .unwrap();

        match verdict {
            Verdict::Counter {
                proposed_price,
                reason_code,
                ..
            } => {
                assert_eq!(proposed_price, 150.0);
                assert_eq!(reason_code, reason::BELOW_FLOOR);
            }
            other => panic!("expected counter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn high_value_bid_requires_confirmation() {
        let strategy = RuleStrategy::default();
        let verdict = strategy
            .evaluate(&room_101(), 1200.0, None, "req_4")
            .await
            .unwrap();

        match verdict {
            Verdict::UiRequired {
                template_id,
                context,
            } => {
                assert_eq!(template_id, HIGH_VALUE_TEMPLATE);
                assert_eq!(context.get("item_name").unwrap(), "Room 101");
                assert_eq!(context.get("price").unwrap(), "1200");
            }
            other => panic!("expected ui_required, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        let strategy = RuleStrategy::default();
        let verdict = strategy
            .evaluate(&room_101(), 1000.0, None, "req_5")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accept { price: 1000.0 });
    }
}
