//! Wire message definitions
//!
//! Hand-tagged prost messages. Tags are append-only: never reuse or renumber
//! a released tag.

use std::collections::HashMap;

use parley_types::ParleyError;
use uuid::Uuid;

/// Caller identity as it crosses the internal wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentIdentity {
    #[prost(string, tag = "1")]
    pub did: String,
    /// Reputation in [0,1] when the edge knows it.
    #[prost(double, optional, tag = "2")]
    pub reputation_score: Option<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NegotiateRequest {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(string, tag = "2")]
    pub item_id: String,
    #[prost(double, tag = "3")]
    pub bid_amount: f64,
    #[prost(string, tag = "4")]
    pub currency_code: String,
    #[prost(message, optional, tag = "5")]
    pub agent: Option<AgentIdentity>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NegotiateResponse {
    #[prost(string, tag = "1")]
    pub session_token: String,
    /// Unix seconds until which the session token is honored.
    #[prost(int64, tag = "2")]
    pub valid_until: i64,
    #[prost(oneof = "negotiate_response::Result", tags = "3, 4, 5, 6")]
    pub result: Option<negotiate_response::Result>,
}

pub mod negotiate_response {
    /// Exactly one negotiation outcome per response.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "3")]
        Accepted(super::OfferAccepted),
        #[prost(message, tag = "4")]
        Countered(super::OfferCountered),
        #[prost(message, tag = "5")]
        Rejected(super::OfferRejected),
        #[prost(message, tag = "6")]
        UiRequired(super::UiRequired),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OfferAccepted {
    #[prost(double, tag = "1")]
    pub final_price: f64,
    /// Reservation code XOR payment lock, never both.
    #[prost(oneof = "offer_accepted::Reveal", tags = "2, 3")]
    pub reveal: Option<offer_accepted::Reveal>,
}

pub mod offer_accepted {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Reveal {
        #[prost(string, tag = "2")]
        ReservationCode(::prost::alloc::string::String),
        #[prost(message, tag = "3")]
        Payment(super::PaymentInstructions),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OfferCountered {
    #[prost(double, tag = "1")]
    pub proposed_price: f64,
    #[prost(string, tag = "2")]
    pub reason_code: String,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OfferRejected {
    #[prost(string, tag = "1")]
    pub reason_code: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UiRequired {
    #[prost(string, tag = "1")]
    pub template_id: String,
    #[prost(map = "string, string", tag = "2")]
    pub context: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PaymentInstructions {
    #[prost(string, tag = "1")]
    pub deal_id: String,
    #[prost(string, tag = "2")]
    pub wallet_address: String,
    /// Amount in the settlement currency.
    #[prost(double, tag = "3")]
    pub amount: f64,
    #[prost(string, tag = "4")]
    pub currency: String,
    #[prost(string, tag = "5")]
    pub memo: String,
    #[prost(string, tag = "6")]
    pub network: String,
    #[prost(int64, tag = "7")]
    pub expires_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckDealStatusRequest {
    #[prost(string, tag = "1")]
    pub deal_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckDealStatusResponse {
    /// One of PAID, PENDING, EXPIRED.
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(message, optional, tag = "2")]
    pub secret: Option<DealSecret>,
    #[prost(message, optional, tag = "3")]
    pub proof: Option<PaymentProof>,
    #[prost(message, optional, tag = "4")]
    pub payment_instructions: Option<PaymentInstructions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DealSecret {
    #[prost(string, tag = "1")]
    pub reservation_code: String,
    #[prost(string, tag = "2")]
    pub item_name: String,
    #[prost(double, tag = "3")]
    pub final_price: f64,
    #[prost(int64, tag = "4")]
    pub paid_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PaymentProof {
    #[prost(string, tag = "1")]
    pub transaction_hash: String,
    #[prost(string, tag = "2")]
    pub block_number: String,
    #[prost(string, tag = "3")]
    pub from_address: String,
    #[prost(int64, tag = "4")]
    pub confirmed_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(bool, tag = "2")]
    pub store: bool,
}

/// Error envelope returned on any non-2xx RPC response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcFailure {
    #[prost(string, tag = "1")]
    pub code: String,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub request_id: String,
}

// ============================================================================
// Conversions to/from domain types
// ============================================================================

impl From<&parley_types::PaymentInstructions> for PaymentInstructions {
    fn from(p: &parley_types::PaymentInstructions) -> Self {
        Self {
            deal_id: p.deal_id.to_string(),
            wallet_address: p.wallet_address.clone(),
            amount: p.amount,
            currency: p.currency.clone(),
            memo: p.memo.clone(),
            network: p.network.clone(),
            expires_at: p.expires_at,
        }
    }
}

impl TryFrom<&PaymentInstructions> for parley_types::PaymentInstructions {
    type Error = ParleyError;

    fn try_from(p: &PaymentInstructions) -> Result<Self, Self::Error> {
        let deal_id = Uuid::parse_str(&p.deal_id)
            .map_err(|_| ParleyError::bad_request("malformed deal id on wire"))?;
        Ok(Self {
            deal_id,
            wallet_address: p.wallet_address.clone(),
            amount: p.amount,
            currency: p.currency.clone(),
            memo: p.memo.clone(),
            network: p.network.clone(),
            expires_at: p.expires_at,
        })
    }
}

impl From<&parley_types::PaymentProof> for PaymentProof {
    fn from(p: &parley_types::PaymentProof) -> Self {
        Self {
            transaction_hash: p.transaction_hash.clone(),
            block_number: p.block_number.clone(),
            from_address: p.from_address.clone(),
            confirmed_at: p.confirmed_at.timestamp(),
        }
    }
}

impl From<&parley_types::DealSecret> for DealSecret {
    fn from(s: &parley_types::DealSecret) -> Self {
        Self {
            reservation_code: s.reservation_code.clone(),
            item_name: s.item_name.clone(),
            final_price: s.final_price,
            paid_at: s.paid_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn negotiate_request_roundtrip() {
        let req = NegotiateRequest {
            request_id: "req_1234".into(),
            item_id: "room-101".into(),
            bid_amount: 160.0,
            currency_code: "USD".into(),
            agent: Some(AgentIdentity {
                did: format!("did:key:{}", "ab".repeat(32)),
                reputation_score: Some(0.9),
            }),
        };

        let bytes = req.encode_to_vec();
        let decoded = NegotiateRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn reveal_variants_are_mutually_exclusive() {
        let accepted = OfferAccepted {
            final_price: 160.0,
            reveal: Some(offer_accepted::Reveal::ReservationCode("RES-x".into())),
        };
        let bytes = accepted.encode_to_vec();
        let decoded = OfferAccepted::decode(bytes.as_slice()).unwrap();

        match decoded.reveal {
            Some(offer_accepted::Reveal::ReservationCode(code)) => assert_eq!(code, "RES-x"),
            other => panic!("unexpected reveal: {other:?}"),
        }

        // Switching to the payment variant replaces, not accumulates.
        let locked = OfferAccepted {
            final_price: 160.0,
            reveal: Some(offer_accepted::Reveal::Payment(PaymentInstructions {
                deal_id: uuid::Uuid::new_v4().to_string(),
                wallet_address: "wallet".into(),
                amount: 1.6,
                currency: "SOL".into(),
                memo: "a1b2c3d4".into(),
                network: "devnet".into(),
                expires_at: 1_700_003_600,
            })),
        };
        let decoded = OfferAccepted::decode(locked.encode_to_vec().as_slice()).unwrap();
        assert!(matches!(
            decoded.reveal,
            Some(offer_accepted::Reveal::Payment(_))
        ));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        // A response encoded by a newer peer with an extra tagged field still
        // decodes; schema evolution must not break old readers.
        let mut bytes = OfferRejected {
            reason_code: "ITEM_NOT_FOUND".into(),
        }
        .encode_to_vec();
        // field 15, varint wire type, value 7
        bytes.extend_from_slice(&[0x78, 0x07]);

        let decoded = OfferRejected::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.reason_code, "ITEM_NOT_FOUND");
    }

    #[test]
    fn instructions_domain_roundtrip() {
        let domain = parley_types::PaymentInstructions {
            deal_id: uuid::Uuid::new_v4(),
            wallet_address: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into(),
            amount: 1.6,
            currency: "SOL".into(),
            memo: "a1b2c3d4".into(),
            network: "mainnet-beta".into(),
            expires_at: 1_700_003_600,
        };
        let wire = PaymentInstructions::from(&domain);
        let back = parley_types::PaymentInstructions::try_from(&wire).unwrap();
        assert_eq!(back, domain);
    }
}
