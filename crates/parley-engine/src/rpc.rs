//! Binary RPC surface
//!
//! The engine's only ingress: protobuf-over-HTTP routes for negotiation,
//! deal status, and health. The correlation id arrives in `x-request-id` and
//! is bound into every log line; errors leave as `RpcFailure` envelopes with
//! stable reason codes, which the edge maps onto HTTP statuses.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prost::Message;
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use parley_db::Database;
use parley_proto::{self as proto, routes, PROTOBUF_CONTENT_TYPE, REQUEST_ID_HEADER};
use parley_types::ParleyError;

use crate::deals::StatusView;
use crate::service::NegotiationService;

pub struct EngineState {
    pub negotiation: NegotiationService,
    pub db: Arc<Database>,
}

/// Build the engine RPC router.
pub fn rpc_router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route(routes::NEGOTIATE, post(negotiate))
        .route(routes::DEAL_STATUS, post(deal_status))
        .route(routes::HEALTH, get(health))
        .with_state(state)
}

async fn negotiate(
    State(state): State<Arc<EngineState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match proto::NegotiateRequest::decode(body.as_ref()) {
        Ok(request) => request,
        Err(e) => {
            return failure_response(
                &ParleyError::bad_request(format!("undecodable request: {e}")),
                "",
            )
        }
    };

    let request_id = correlation_id(&headers, &request.request_id);
    let span = info_span!("rpc_negotiate", request_id = %request_id);

    let result = state
        .negotiation
        .negotiate(&request, &request_id)
        .instrument(span)
        .await;

    match result {
        Ok(response) => proto_response(StatusCode::OK, &response),
        Err(e) => failure_response(&e, &request_id),
    }
}

async fn deal_status(
    State(state): State<Arc<EngineState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match proto::CheckDealStatusRequest::decode(body.as_ref()) {
        Ok(request) => request,
        Err(e) => {
            return failure_response(
                &ParleyError::bad_request(format!("undecodable request: {e}")),
                "",
            )
        }
    };

    let request_id = correlation_id(&headers, "");
    let span = info_span!("rpc_deal_status", request_id = %request_id, deal_id = %request.deal_id);

    let result = async {
        let Some(deals) = state.negotiation.deal_service() else {
            return Err(ParleyError::FeatureDisabled {
                feature: "crypto payments".to_string(),
            });
        };

        let deal_id = Uuid::parse_str(&request.deal_id)
            .map_err(|_| ParleyError::bad_request("deal_id must be a UUID"))?;

        deals.check(deal_id, &request_id).await
    }
    .instrument(span)
    .await;

    match result {
        Ok(view) => proto_response(StatusCode::OK, &status_to_proto(view)),
        Err(e) => failure_response(&e, &request_id),
    }
}

async fn health(State(state): State<Arc<EngineState>>) -> Response {
    let store = state.db.health_check().await;
    let response = proto::HealthResponse {
        status: if store { "SERVING" } else { "NOT_SERVING" }.to_string(),
        store,
    };
    // Always 200: the caller reads the store flag, and a non-2xx body would
    // not decode as a failure envelope.
    proto_response(StatusCode::OK, &response)
}

fn status_to_proto(view: StatusView) -> proto::CheckDealStatusResponse {
    match view {
        StatusView::Pending(instructions) => proto::CheckDealStatusResponse {
            status: "PENDING".to_string(),
            secret: None,
            proof: None,
            payment_instructions: Some((&instructions).into()),
        },
        StatusView::Paid { secret, proof } => proto::CheckDealStatusResponse {
            status: "PAID".to_string(),
            secret: Some((&secret).into()),
            proof: Some((&proof).into()),
            payment_instructions: None,
        },
        StatusView::Expired => proto::CheckDealStatusResponse {
            status: "EXPIRED".to_string(),
            secret: None,
            proof: None,
            payment_instructions: None,
        },
    }
}

fn correlation_id(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| {
            if fallback.is_empty() {
                format!("req_{}", Uuid::new_v4())
            } else {
                fallback.to_string()
            }
        })
}

fn proto_response<M: Message>(code: StatusCode, message: &M) -> Response {
    (
        code,
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        message.encode_to_vec(),
    )
        .into_response()
}

fn failure_response(error: &ParleyError, request_id: &str) -> Response {
    let code = error.error_code();
    let status = match code {
        "BAD_REQUEST" | "UNKNOWN_CURRENCY" => StatusCode::BAD_REQUEST,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "FEATURE_DISABLED" => StatusCode::NOT_IMPLEMENTED,
        "STRATEGY_UNAVAILABLE" | "CHAIN_UNAVAILABLE" | "STORE_UNAVAILABLE" => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let failure = proto::RpcFailure {
        code: code.to_string(),
        message: error.to_string(),
        request_id: request_id.to_string(),
    };
    proto_response(status, &failure)
}

/// JSON liveness probe for orchestrators that cannot speak protobuf.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_status_mapping() {
        let cases = [
            (
                ParleyError::bad_request("bad uuid"),
                StatusCode::BAD_REQUEST,
            ),
            (
                ParleyError::DealNotFound {
                    deal_id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ParleyError::FeatureDisabled {
                    feature: "crypto payments".into(),
                },
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                ParleyError::StrategyUnavailable {
                    reason: "model down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ParleyError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let response = failure_response(&error, "req_1");
            assert_eq!(response.status(), expected, "for {error}");
        }
    }

    #[test]
    fn correlation_id_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "req_from_edge".parse().unwrap());
        assert_eq!(correlation_id(&headers, "req_body"), "req_from_edge");

        let empty = HeaderMap::new();
        assert_eq!(correlation_id(&empty, "req_body"), "req_body");
        assert!(correlation_id(&empty, "").starts_with("req_"));
    }
}
