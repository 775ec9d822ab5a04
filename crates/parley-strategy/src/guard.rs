//! Decision guard
//!
//! Deterministic safety layer between the strategy and the wire. Two checks:
//! an Accept below the item's floor price is downgraded to a Counter at the
//! floor, and any caller-visible text carrying the floor figure is replaced.
//! Rule decisions pass through untouched in practice; this exists so a model
//! hallucination can never breach the floor or leak it.

use std::collections::BTreeMap;
use tracing::warn;

use parley_types::decision::reason;
use parley_types::{Item, Verdict};

const SCRUBBED_MESSAGE: &str = "Let's keep negotiating toward a price that works.";

#[derive(Debug, Default)]
pub struct DecisionGuard;

impl DecisionGuard {
    pub fn new() -> Self {
        Self
    }

    /// Validate and sanitize a verdict against the item's hidden floor.
    pub fn apply(&self, verdict: Verdict, item: &Item, request_id: &str) -> Verdict {
        match verdict {
            Verdict::Accept { price } if price < item.floor_price => {
                warn!(
                    request_id,
                    item_id = %item.id,
                    "floor_breach_downgraded"
                );
                Verdict::Counter {
                    proposed_price: item.floor_price,
                    reason_code: reason::BELOW_FLOOR.to_string(),
                    message: SCRUBBED_MESSAGE.to_string(),
                }
            }
            Verdict::Counter {
                proposed_price,
                reason_code,
                message,
            } => Verdict::Counter {
                proposed_price,
                reason_code,
                message: self.scrub(message, item, request_id),
            },
            Verdict::UiRequired {
                template_id,
                context,
            } => Verdict::UiRequired {
                template_id,
                context: self.scrub_context(context, item, request_id),
            },
            other => other,
        }
    }

    fn scrub(&self, text: String, item: &Item, request_id: &str) -> String {
        if leaks_floor(&text, item.floor_price) {
            warn!(request_id, item_id = %item.id, "floor_price_scrubbed");
            SCRUBBED_MESSAGE.to_string()
        } else {
            text
        }
    }

    fn scrub_context(
        &self,
        context: BTreeMap<String, String>,
        item: &Item,
        request_id: &str,
    ) -> BTreeMap<String, String> {
        context
            .into_iter()
            .map(|(key, value)| {
                let value = self.scrub(value, item, request_id);
                (key, value)
            })
            .collect()
    }
}

/// Whether `text` carries the floor price in any common rendering.
fn leaks_floor(text: &str, floor: f64) -> bool {
    let mut renderings = vec![format!("{floor}"), format!("{floor:.1}"), format!("{floor:.2}")];
    if floor.fract() == 0.0 {
        renderings.push(format!("{}", floor as i64));
    }
    renderings.sort_unstable_by_key(|s| std::cmp::Reverse(s.len()));

    for rendering in &renderings {
        if let Some(pos) = text.find(rendering.as_str()) {
            // Reject partial matches inside a longer number: "150" in "1500".
            let before = text[..pos].chars().next_back();
            let after = text[pos + rendering.len()..].chars().next();
            let digit_before = before.map(|c| c.is_ascii_digit()).unwrap_or(false);
            let digit_after = after
                .map(|c| c.is_ascii_digit() || c == '.')
                .unwrap_or(false);
            if !digit_before && !digit_after {
                return true;
            }
        }
    }
    false
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

    #[test]
    fn accept_below_floor_becomes_counter_at_floor() {
        let guard = DecisionGuard::new();
        let verdict = guard.apply(Verdict::Accept { price: 120.0 }, &room_101(), "req_1");

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

    #[test]
    fn accept_at_floor_passes_through() {
        let guard = DecisionGuard::new();
        let verdict = guard.apply(Verdict::Accept { price: 150.0 }, &room_101(), "req_2");
        assert_eq!(verdict, Verdict::Accept { price: 150.0 });
    }

    #[test]
    fn counter_message_leaking_floor_is_scrubbed() {
        let guard = DecisionGuard::new();
        let verdict = guard.apply(
            Verdict::Counter {
                proposed_price: 170.0,
                reason_code: reason::NEGOTIATION_ONGOING.into(),
                message: "Our minimum is $150, take it or leave it".into(),
            },
            &room_101(),
            "req_3",
        );

        match verdict {
            Verdict::Counter { message, .. } => {
                assert!(!message.contains("150"));
            }
            other => panic!("expected counter, got {other:?}"),
        }
    }

    #[test]
    fn clean_counter_message_is_untouched() {
        let guard = DecisionGuard::new();
        let message = "We could settle at $180 for Room 101.";
        let verdict = guard.apply(
            Verdict::Counter {
                proposed_price: 180.0,
                reason_code: reason::NEGOTIATION_ONGOING.into(),
                message: message.into(),
            },
            &room_101(),
            "req_4",
        );

        match verdict {
            Verdict::Counter { message: m, .. } => assert_eq!(m, message),
            other => panic!("expected counter, got {other:?}"),
        }
    }

    #[test]
    fn ui_context_leaking_floor_is_scrubbed() {
        let guard = DecisionGuard::new();
        let mut context = BTreeMap::new();
        context.insert("reason".to_string(), "floor is 150.0".to_string());
        context.insert("item_name".to_string(), "Room 101".to_string());

        let verdict = guard.apply(
            Verdict::UiRequired {
                template_id: "high_value_confirm".into(),
                context,
            },
            &room_101(),
            "req_5",
        );

        match verdict {
            Verdict::UiRequired { context, .. } => {
                assert!(!context.get("reason").unwrap().contains("150"));
                assert_eq!(context.get("item_name").unwrap(), "Room 101");
            }
            other => panic!("expected ui_required, got {other:?}"),
        }
    }

    #[test]
    fn longer_numbers_are_not_false_positives() {
        assert!(!leaks_floor("the total is 1500 dollars", 150.0));
        assert!(!leaks_floor("item 2150 is out of stock", 150.0));
        assert!(leaks_floor("we can do 150", 150.0));
        assert!(leaks_floor("minimum 150.00 per night", 150.0));
    }
}
