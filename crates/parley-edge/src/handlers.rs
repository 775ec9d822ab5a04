//! Edge HTTP handlers
//!
//! Translate between the public JSON surface and the engine RPC. Handlers
//! never re-parse the raw body: the auth middleware stored the parsed
//! structure, so what was hashed is what gets handled.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use parley_proto::{self as proto, negotiate_response::Result as WireResult, offer_accepted};
use parley_types::ParleyError;

use crate::auth::{ParsedBody, VerifiedCaller};
use crate::dto::NegotiateRequestHttp;
use crate::error::{EdgeError, EdgeResult};
use crate::state::EdgeState;

// =============================================================================
// Extractors
// =============================================================================

/// Correlation id assigned (or propagated) by the request-id layer.
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

/// The canonical body, deserialized and validated.
///
/// Pulls the structure the auth middleware already parsed; re-reading the
/// raw bytes here is forbidden by construction (the extractor has no body
/// access at all).
pub struct CanonicalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for CanonicalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = EdgeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = parts.extensions.get::<ParsedBody>().ok_or_else(|| {
            EdgeError::new(
                ParleyError::bad_request("request body is required"),
                request_id.clone(),
            )
        })?;

        let value: T = serde_json::from_value((*body.0).clone())
            .map_err(|e| EdgeError::new(ParleyError::bad_request(e.to_string()), request_id.clone()))?;

        value
            .validate()
            .map_err(|e| EdgeError::new(ParleyError::bad_request(e.to_string()), request_id))?;

        Ok(CanonicalJson(value))
    }
}

// =============================================================================
// Negotiation
// =============================================================================

pub async fn negotiate(
    State(state): State<Arc<EdgeState>>,
    RequestId(request_id): RequestId,
    caller: VerifiedCaller,
    CanonicalJson(body): CanonicalJson<NegotiateRequestHttp>,
) -> EdgeResult<Json<Value>> {
    if body.agent_did != caller.did.as_str() {
        return Err(EdgeError::new(
            ParleyError::bad_request("agent_did does not match the authenticated caller"),
            request_id,
        ));
    }

    let rpc_request = proto::NegotiateRequest {
        request_id: request_id.clone(),
        item_id: body.item_id,
        bid_amount: body.bid_amount,
        currency_code: body.currency_code,
        agent: Some(proto::AgentIdentity {
            did: caller.did.to_string(),
            reputation_score: caller.reputation,
        }),
    };

    let response = state
        .engine
        .negotiate(&rpc_request, &request_id)
        .await
        .map_err(|e| EdgeError::from_rpc(e, request_id.clone()))?;

    let result = response.result.ok_or_else(|| {
        EdgeError::new(
            ParleyError::internal("engine returned no negotiation result"),
            request_id.clone(),
        )
    })?;

    info!(
        request_id = %request_id,
        agent_did = caller.did.as_str(),
        "negotiation_response_relayed"
    );

    Ok(Json(render_negotiation(
        &response.session_token,
        response.valid_until,
        result,
    )))
}

fn render_negotiation(session_token: &str, valid_until: i64, result: WireResult) -> Value {
    let mut output = json!({
        "session_token": session_token,
        "valid_until": valid_until,
    });

    match result {
        WireResult::Accepted(offer) => {
            output["status"] = json!("accepted");
            match offer.reveal {
                Some(offer_accepted::Reveal::Payment(instructions)) => {
                    output["payment_required"] = json!(true);
                    output["data"] = json!({
                        "final_price": offer.final_price,
                        "payment_instructions": {
                            "deal_id": instructions.deal_id,
                            "wallet_address": instructions.wallet_address,
                            "amount": instructions.amount,
                            "currency": instructions.currency,
                            "memo": instructions.memo,
                            "network": instructions.network,
                            "expires_at": instructions.expires_at,
                        },
                    });
                }
                Some(offer_accepted::Reveal::ReservationCode(code)) => {
                    output["payment_required"] = json!(false);
                    output["data"] = json!({
                        "final_price": offer.final_price,
                        "reservation_code": code,
                    });
                }
                None => {
                    output["payment_required"] = json!(false);
                    output["data"] = json!({ "final_price": offer.final_price });
                }
            }
        }
        WireResult::Countered(counter) => {
            output["status"] = json!("countered");
            output["data"] = json!({
                "proposed_price": counter.proposed_price,
                "reason_code": counter.reason_code,
                "message": counter.message,
            });
        }
        WireResult::Rejected(rejection) => {
            output["status"] = json!("rejected");
            output["data"] = json!({ "reason_code": rejection.reason_code });
        }
        WireResult::UiRequired(ui) => {
            output["status"] = json!("ui_required");
            output["action_required"] = json!({
                "template": ui.template_id,
                "context": ui.context,
            });
        }
    }

    output
}

// =============================================================================
// Deal status
// =============================================================================

pub async fn deal_status(
    State(state): State<Arc<EdgeState>>,
    RequestId(request_id): RequestId,
    caller: VerifiedCaller,
    Path(deal_id): Path<String>,
) -> EdgeResult<Json<Value>> {
    // Reject malformed ids before spending an RPC on them.
    if Uuid::parse_str(&deal_id).is_err() {
        return Err(EdgeError::new(
            ParleyError::bad_request("deal id must be a UUID"),
            request_id,
        ));
    }

    let response = state
        .engine
        .check_deal_status(&deal_id, &request_id)
        .await
        .map_err(|e| EdgeError::from_rpc(e, request_id.clone()))?;

    info!(
        request_id = %request_id,
        agent_did = caller.did.as_str(),
        deal_id = %deal_id,
        status = %response.status,
        "deal_status_relayed"
    );

    Ok(Json(render_deal_status(response)))
}

fn render_deal_status(response: proto::CheckDealStatusResponse) -> Value {
    let mut output = json!({ "status": response.status });

    if let Some(secret) = response.secret {
        output["secret"] = json!({
            "reservation_code": secret.reservation_code,
            "item_name": secret.item_name,
            "final_price": secret.final_price,
            "paid_at": secret.paid_at,
        });
    }
    if let Some(proof) = response.proof {
        output["proof"] = json!({
            "transaction_hash": proof.transaction_hash,
            "block_number": proof.block_number,
            "from_address": proof.from_address,
            "confirmed_at": proof.confirmed_at,
        });
    }
    if let Some(instructions) = response.payment_instructions {
        output["payment_instructions"] = json!({
            "deal_id": instructions.deal_id,
            "wallet_address": instructions.wallet_address,
            "amount": instructions.amount,
            "currency": instructions.currency,
            "memo": instructions.memo,
            "network": instructions.network,
            "expires_at": instructions.expires_at,
        });
    }

    output
}

// =============================================================================
// Health
// =============================================================================

/// Liveness: the edge process is up.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the engine answers its health RPC within the short deadline.
pub async fn readyz(State(state): State<Arc<EdgeState>>) -> Response {
    let (ready, engine) = match state.engine.health().await {
        Ok(health) => (
            health.store,
            json!({
                "status": if health.store { "healthy" } else { "unhealthy" },
                "store": health.store,
            }),
        ),
        Err(e) => (
            false,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "dependencies": { "engine": engine },
    });

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_with_reservation_code() {
        let result = WireResult::Accepted(proto::OfferAccepted {
            final_price: 160.0,
            reveal: Some(offer_accepted::Reveal::ReservationCode("RES-abc".into())),
        });
        let output = render_negotiation("sess_1", 1_700_000_600, result);

        assert_eq!(output["status"], "accepted");
        assert_eq!(output["payment_required"], false);
        assert_eq!(output["data"]["final_price"], 160.0);
        assert_eq!(output["data"]["reservation_code"], "RES-abc");
    }

    #[test]
    fn accepted_with_payment_lock() {
        let deal_id = Uuid::new_v4().to_string();
        let result = WireResult::Accepted(proto::OfferAccepted {
            final_price: 160.0,
            reveal: Some(offer_accepted::Reveal::Payment(proto::PaymentInstructions {
                deal_id: deal_id.clone(),
                wallet_address: "wallet".into(),
                amount: 1.6,
                currency: "SOL".into(),
                memo: "a1b2c3d4".into(),
                network: "devnet".into(),
                expires_at: 1_700_003_600,
            })),
        });
        let output = render_negotiation("sess_1", 1_700_000_600, result);

        assert_eq!(output["status"], "accepted");
        assert_eq!(output["payment_required"], true);
        assert_eq!(output["data"]["payment_instructions"]["deal_id"], deal_id);
        assert_eq!(output["data"]["payment_instructions"]["amount"], 1.6);
        // The two reveal shapes are mutually exclusive.
        assert!(output["data"].get("reservation_code").is_none());
    }

    #[test]
    fn countered_carries_reason_and_price() {
        let result = WireResult::Countered(proto::OfferCountered {
            proposed_price: 150.0,
            reason_code: "BELOW_FLOOR".into(),
            message: "Too low.".into(),
        });
        let output = render_negotiation("sess_1", 0, result);

        assert_eq!(output["status"], "countered");
        assert_eq!(output["data"]["proposed_price"], 150.0);
        assert_eq!(output["data"]["reason_code"], "BELOW_FLOOR");
    }

    #[test]
    fn ui_required_uses_action_required() {
        let mut context = std::collections::HashMap::new();
        context.insert("item_name".to_string(), "Room 101".to_string());
        let result = WireResult::UiRequired(proto::UiRequired {
            template_id: "high_value_confirm".into(),
            context,
        });
        let output = render_negotiation("sess_1", 0, result);

        assert_eq!(output["status"], "ui_required");
        assert_eq!(output["action_required"]["template"], "high_value_confirm");
        assert!(output.get("data").is_none());
    }

    #[test]
    fn paid_status_renders_secret_and_proof() {
        let response = proto::CheckDealStatusResponse {
            status: "PAID".into(),
            secret: Some(proto::DealSecret {
                reservation_code: "RES-abc".into(),
                item_name: "Room 101".into(),
                final_price: 160.0,
                paid_at: 1_700_000_100,
            }),
            proof: Some(proto::PaymentProof {
                transaction_hash: "5Sig".into(),
                block_number: "228".into(),
                from_address: "Sender".into(),
                confirmed_at: 1_700_000_100,
            }),
            payment_instructions: None,
        };
        let output = render_deal_status(response);

        assert_eq!(output["status"], "PAID");
        assert_eq!(output["secret"]["reservation_code"], "RES-abc");
        assert_eq!(output["proof"]["transaction_hash"], "5Sig");
        assert!(output.get("payment_instructions").is_none());
    }

    #[test]
    fn pending_status_renders_instructions_only() {
        let response = proto::CheckDealStatusResponse {
            status: "PENDING".into(),
            secret: None,
            proof: None,
            payment_instructions: Some(proto::PaymentInstructions {
                deal_id: Uuid::new_v4().to_string(),
                wallet_address: "wallet".into(),
                amount: 1.6,
                currency: "SOL".into(),
                memo: "a1b2c3d4".into(),
                network: "devnet".into(),
                expires_at: 1_700_003_600,
            }),
        };
        let output = render_deal_status(response);

        assert_eq!(output["status"], "PENDING");
        assert!(output.get("secret").is_none());
        assert_eq!(output["payment_instructions"]["memo"], "a1b2c3d4");
    }
}
