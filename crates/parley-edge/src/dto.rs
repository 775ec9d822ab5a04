//! Public API request types
//!
//! The JSON surface agents sign. Validation catches shape errors before the
//! RPC hop; the engine re-validates business rules independently.

use serde::Deserialize;
use validator::Validate;

fn default_currency() -> String {
    "USD".to_string()
}

/// Body of `POST /v1/negotiate`.
#[derive(Debug, Deserialize, Validate)]
pub struct NegotiateRequestHttp {
    #[validate(length(min = 1, max = 128))]
    pub item_id: String,

    #[validate(range(exclusive_min = 0.0))]
    pub bid_amount: f64,

    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 8))]
    pub currency_code: String,

    /// Must match the authenticated caller's DID.
    #[validate(length(min = 1))]
    pub agent_did: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_default_currency() {
        let request: NegotiateRequestHttp = serde_json::from_str(
            r#"{"item_id":"room-101","bid_amount":160.0,"agent_did":"did:key:ab"}"#,
        )
        .unwrap();
        assert_eq!(request.currency_code, "USD");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn zero_bid_fails_validation() {
        let request: NegotiateRequestHttp = serde_json::from_str(
            r#"{"item_id":"room-101","bid_amount":0.0,"agent_did":"did:key:ab"}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn negative_bid_fails_validation() {
        let request: NegotiateRequestHttp = serde_json::from_str(
            r#"{"item_id":"room-101","bid_amount":-5.0,"agent_did":"did:key:ab"}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }
}
