//! Locked-deal lifecycle types
//!
//! A deal is created PENDING when an accepted offer is locked behind payment,
//! and moves exactly once to PAID (on chain proof) or EXPIRED (past its TTL).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParleyError;

/// Settlement state of a locked deal. Transitions are monotonic:
/// PENDING may become PAID or EXPIRED; nothing else moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStatus {
    Pending,
    Paid,
    Expired,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Pending, Self::Expired)
        )
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(ParleyError::Internal {
                message: format!("unknown deal status '{other}' in store"),
            }),
        }
    }
}

/// Everything a buyer needs to settle a locked deal on-chain.
///
/// This is the public projection of a deal: no secret material, no floor
/// price, nothing the edge is not allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstructions {
    pub deal_id: Uuid,
    pub wallet_address: String,
    /// Amount in the settlement currency (not fiat).
    pub amount: f64,
    pub currency: String,
    /// Unique token the transfer must carry in its memo instruction.
    pub memo: String,
    pub network: String,
    pub expires_at: i64,
}

/// Evidence recorded when a deal transitions to PAID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub transaction_hash: String,
    pub block_number: String,
    pub from_address: String,
    pub confirmed_at: DateTime<Utc>,
}

/// The unlocked secret revealed once a deal is PAID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSecret {
    pub reservation_code: String,
    pub item_name: String,
    pub final_price: f64,
    pub paid_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [DealStatus::Pending, DealStatus::Paid, DealStatus::Expired] {
            assert_eq!(s.as_str().parse::<DealStatus>().unwrap(), s);
        }
        assert!("UNKNOWN".parse::<DealStatus>().is_err());
    }

    #[test]
    fn transitions_are_monotonic() {
        assert!(DealStatus::Pending.can_transition_to(DealStatus::Paid));
        assert!(DealStatus::Pending.can_transition_to(DealStatus::Expired));
        assert!(!DealStatus::Paid.can_transition_to(DealStatus::Pending));
        assert!(!DealStatus::Paid.can_transition_to(DealStatus::Expired));
        assert!(!DealStatus::Expired.can_transition_to(DealStatus::Paid));
    }
}
