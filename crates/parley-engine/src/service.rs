//! Negotiation handler
//!
//! One request/response turn: load the item, run the configured strategy
//! through the decision guard, and attach the settlement reveal when the
//! offer is accepted. With crypto settlement enabled the reveal is a payment
//! lock; otherwise the reservation code is returned directly.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use parley_db::ItemRepo;
use parley_proto as proto;
use parley_strategy::{DecisionGuard, PricingStrategy};
use parley_types::decision::reason;
use parley_types::{Decision, Item, ParleyError, Reveal, Verdict, FIAT_CURRENCIES};

use crate::deals::DealService;
use crate::tokens;

/// How long a session token stays valid, in seconds.
const SESSION_TTL_SECS: i64 = 600;

pub struct NegotiationService {
    items: ItemRepo,
    strategy: Arc<dyn PricingStrategy>,
    guard: DecisionGuard,
    /// Present only when crypto settlement is enabled.
    deals: Option<Arc<DealService>>,
}

impl NegotiationService {
    pub fn new(
        items: ItemRepo,
        strategy: Arc<dyn PricingStrategy>,
        deals: Option<Arc<DealService>>,
    ) -> Self {
        Self {
            items,
            strategy,
            guard: DecisionGuard::new(),
            deals,
        }
    }

    /// Whether accepted offers get locked behind payment.
    pub fn crypto_enabled(&self) -> bool {
        self.deals.is_some()
    }

    /// Deal service accessor for the status RPC.
    pub fn deal_service(&self) -> Option<&Arc<DealService>> {
        self.deals.as_ref()
    }

    /// Run one negotiation turn.
    pub async fn negotiate(
        &self,
        request: &proto::NegotiateRequest,
        request_id: &str,
    ) -> Result<proto::NegotiateResponse, ParleyError> {
        let started = std::time::Instant::now();
        let agent_did = request.agent.as_ref().map(|a| a.did.as_str()).unwrap_or("");
        let reputation = request
            .agent
            .as_ref()
            .and_then(|a| a.reputation_score)
            .map(|r| r.clamp(0.0, 1.0));

        info!(
            request_id,
            item_id = %request.item_id,
            bid_amount = request.bid_amount,
            agent_did,
            "negotiation_started"
        );

        if request.bid_amount <= 0.0 || !request.bid_amount.is_finite() {
            return Err(ParleyError::bad_request("bid amount must be positive"));
        }
        if !FIAT_CURRENCIES.contains(&request.currency_code.as_str()) {
            return Err(ParleyError::UnknownCurrency {
                code: request.currency_code.clone(),
            });
        }

        let decision = match self.load_item(&request.item_id).await? {
            None => Decision::Rejected {
                reason_code: reason::ITEM_NOT_FOUND.to_string(),
            },
            Some(item) => {
                let verdict = self
                    .strategy
                    .evaluate(&item, request.bid_amount, reputation, request_id)
                    .await
                    .map_err(|e| {
                        error!(request_id, error = %e, "strategy_failed");
                        ParleyError::StrategyUnavailable {
                            reason: e.to_string(),
                        }
                    })?;

                let verdict = self.guard.apply(verdict, &item, request_id);
                self.settle_verdict(verdict, &item, agent_did, request_id)
                    .await?
            }
        };

        metrics::counter!("parley_negotiations_total", "outcome" => decision.status())
            .increment(1);
        info!(
            request_id,
            agent_did,
            outcome = decision.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "negotiation_completed"
        );

        Ok(proto::NegotiateResponse {
            session_token: format!("sess_{request_id}"),
            valid_until: chrono::Utc::now().timestamp() + SESSION_TTL_SECS,
            result: Some(decision_to_proto(decision)),
        })
    }

    async fn load_item(&self, item_id: &str) -> Result<Option<Item>, ParleyError> {
        let row = self
            .items
            .find_by_id(item_id)
            .await
            .map_err(|e| ParleyError::StoreUnavailable {
                reason: e.to_string(),
            })?;

        Ok(row.map(Item::from).filter(|item| item.active))
    }

    /// Attach the settlement reveal to an accepted verdict.
    async fn settle_verdict(
        &self,
        verdict: Verdict,
        item: &Item,
        agent_did: &str,
        request_id: &str,
    ) -> Result<Decision, ParleyError> {
        let decision = match verdict {
            Verdict::Accept { price } => {
                let reveal = match &self.deals {
                    Some(deals) => {
                        let buyer = (!agent_did.is_empty()).then_some(agent_did);
                        let instructions = deals.lock(item, price, buyer, request_id).await?;
                        info!(
                            request_id,
                            deal_id = %instructions.deal_id,
                            item_id = %item.id,
                            amount = instructions.amount,
                            currency = %instructions.currency,
                            "offer_locked_for_payment"
                        );
                        Reveal::PaymentLock {
                            deal_id: instructions.deal_id,
                            instructions,
                        }
                    }
                    None => {
                        info!(request_id, item_id = %item.id, final_price = price, "offer_accepted");
                        Reveal::ReservationCode(tokens::reservation_code())
                    }
                };
                Decision::Accepted {
                    final_price: price,
                    reveal,
                }
            }
            Verdict::Counter {
                proposed_price,
                reason_code,
                message,
            } => Decision::Countered {
                proposed_price,
                reason_code,
                message,
            },
            Verdict::Reject { reason_code } => Decision::Rejected { reason_code },
            Verdict::UiRequired {
                template_id,
                context,
            } => Decision::UiRequired {
                template_id,
                context,
            },
        };

        Ok(decision)
    }
}

/// Map a domain decision onto the wire oneof.
pub fn decision_to_proto(decision: Decision) -> proto::negotiate_response::Result {
    use proto::negotiate_response::Result as WireResult;

    match decision {
        Decision::Accepted {
            final_price,
            reveal,
        } => WireResult::Accepted(proto::OfferAccepted {
            final_price,
            reveal: Some(match reveal {
                Reveal::ReservationCode(code) => {
                    proto::offer_accepted::Reveal::ReservationCode(code)
                }
                Reveal::PaymentLock { instructions, .. } => {
                    proto::offer_accepted::Reveal::Payment((&instructions).into())
                }
            }),
        }),
        Decision::Countered {
            proposed_price,
            reason_code,
            message,
        } => WireResult::Countered(proto::OfferCountered {
            proposed_price,
            reason_code,
            message,
        }),
        Decision::Rejected { reason_code } => {
            WireResult::Rejected(proto::OfferRejected { reason_code })
        }
        Decision::UiRequired {
            template_id,
            context,
        } => WireResult::UiRequired(proto::UiRequired {
            template_id,
            context: context.into_iter().collect(),
        }),
    }
}

/// Build the context map the rule strategy's UI escalation uses; shared with
/// tests exercising the wire conversion.
pub fn ui_context(item_name: &str, price: f64) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert("item_name".to_string(), item_name.to_string());
    context.insert("price".to_string(), format!("{price}"));
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_maps_to_exclusive_oneof() {
        let accepted = Decision::Accepted {
            final_price: 160.0,
            reveal: Reveal::ReservationCode("RES-abc".into()),
        };
        match decision_to_proto(accepted) {
            proto::negotiate_response::Result::Accepted(offer) => {
                assert_eq!(offer.final_price, 160.0);
                assert!(matches!(
                    offer.reveal,
                    Some(proto::offer_accepted::Reveal::ReservationCode(_))
                ));
            }
            other => panic!("unexpected wire result: {other:?}"),
        }
    }

    #[test]
    fn ui_required_context_survives_conversion() {
        let decision = Decision::UiRequired {
            template_id: "high_value_confirm".into(),
            context: ui_context("Room 101", 1200.0),
        };
        match decision_to_proto(decision) {
            proto::negotiate_response::Result::UiRequired(ui) => {
                assert_eq!(ui.template_id, "high_value_confirm");
                assert_eq!(ui.context.get("item_name").unwrap(), "Room 101");
                assert_eq!(ui.context.get("price").unwrap(), "1200");
            }
            other => panic!("unexpected wire result: {other:?}"),
        }
    }
}
