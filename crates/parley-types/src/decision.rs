//! Negotiation decisions
//!
//! A strategy produces a [`Verdict`]; the engine turns it into a [`Decision`]
//! by attaching the settlement [`Reveal`] when the offer is accepted. Both are
//! sum types: exactly one variant, never a bag of optional fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::deal::PaymentInstructions;

/// Stable reason codes carried on counter/reject decisions.
pub mod reason {
    pub const ITEM_NOT_FOUND: &str = "ITEM_NOT_FOUND";
    pub const BELOW_FLOOR: &str = "BELOW_FLOOR";
    pub const OFFER_TOO_LOW: &str = "OFFER_TOO_LOW";
    pub const NEGOTIATION_ONGOING: &str = "NEGOTIATION_ONGOING";
}

/// Template id for the high-value confirmation flow.
pub const HIGH_VALUE_TEMPLATE: &str = "high_value_confirm";

/// Raw strategy output, before the engine attaches settlement artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Accept {
        price: f64,
    },
    Counter {
        proposed_price: f64,
        reason_code: String,
        message: String,
    },
    Reject {
        reason_code: String,
    },
    UiRequired {
        template_id: String,
        context: BTreeMap<String, String>,
    },
}

/// The settlement artifact attached to an accepted offer.
///
/// Mutually exclusive by construction: an accepted offer either reveals its
/// reservation code immediately or locks it behind an on-chain payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reveal {
    ReservationCode(String),
    PaymentLock {
        deal_id: Uuid,
        instructions: PaymentInstructions,
    },
}

/// A complete negotiation decision, ready for the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Accepted {
        final_price: f64,
        reveal: Reveal,
    },
    Countered {
        proposed_price: f64,
        reason_code: String,
        message: String,
    },
    Rejected {
        reason_code: String,
    },
    UiRequired {
        template_id: String,
        context: BTreeMap<String, String>,
    },
}

impl Decision {
    /// Wire status label for this variant.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Countered { .. } => "countered",
            Self::Rejected { .. } => "rejected",
            Self::UiRequired { .. } => "ui_required",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        let d = Decision::Rejected {
            reason_code: reason::ITEM_NOT_FOUND.into(),
        };
        assert_eq!(d.status(), "rejected");

        let d = Decision::Accepted {
            final_price: 160.0,
            reveal: Reveal::ReservationCode("RES-abc".into()),
        };
        assert_eq!(d.status(), "accepted");
    }
}
