//! Engine RPC client
//!
//! Thin protobuf-over-HTTP client used by the edge. Every call carries the
//! correlation id in `x-request-id` and a deadline derived from the inbound
//! request class: negotiations get the long budget, status polls a short
//! one, readiness probes the shortest.

use prost::Message;
use std::time::Duration;
use thiserror::Error;

use crate::message::{
    CheckDealStatusRequest, CheckDealStatusResponse, HealthResponse, NegotiateRequest,
    NegotiateResponse, RpcFailure,
};
use crate::{routes, PROTOBUF_CONTENT_TYPE, REQUEST_ID_HEADER};

/// Deadline for negotiation calls.
pub const NEGOTIATE_DEADLINE: Duration = Duration::from_secs(30);
/// Deadline for deal status calls.
pub const STATUS_DEADLINE: Duration = Duration::from_secs(10);
/// Deadline for readiness probes.
pub const HEALTH_DEADLINE: Duration = Duration::from_secs(2);

/// RPC transport and protocol errors.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Engine unreachable, connection refused, or deadline exceeded.
    #[error("engine transport error: {0}")]
    Transport(String),

    /// Engine answered with a structured failure envelope.
    #[error("engine failure {code}: {message}")]
    Failure { code: String, message: String },

    /// Response bytes did not decode as the expected message.
    #[error("engine response decode error: {0}")]
    Decode(String),
}

impl RpcError {
    /// The stable reason code this error maps to at the HTTP boundary.
    pub fn code(&self) -> &str {
        match self {
            Self::Failure { code, .. } => code,
            Self::Transport(_) => "ENGINE_UNAVAILABLE",
            Self::Decode(_) => "INTERNAL",
        }
    }
}

/// Client for the engine's binary RPC surface.
#[derive(Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Run a negotiation turn on the engine.
    pub async fn negotiate(
        &self,
        request: &NegotiateRequest,
        request_id: &str,
    ) -> Result<NegotiateResponse, RpcError> {
        self.call(routes::NEGOTIATE, request, request_id, NEGOTIATE_DEADLINE)
            .await
    }

    /// Poll a locked deal's settlement status.
    pub async fn check_deal_status(
        &self,
        deal_id: &str,
        request_id: &str,
    ) -> Result<CheckDealStatusResponse, RpcError> {
        let request = CheckDealStatusRequest {
            deal_id: deal_id.to_string(),
        };
        self.call(routes::DEAL_STATUS, &request, request_id, STATUS_DEADLINE)
            .await
    }

    /// Probe engine readiness with the short deadline.
    pub async fn health(&self) -> Result<HealthResponse, RpcError> {
        let url = format!("{}{}", self.base_url, routes::HEALTH);
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_DEADLINE)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Self::decode_response(response).await
    }

    async fn call<Req: Message, Resp: Message + Default>(
        &self,
        route: &str,
        request: &Req,
        request_id: &str,
        deadline: Duration,
    ) -> Result<Resp, RpcError> {
        let url = format!("{}{}", self.base_url, route);
        let response = self
            .http
            .post(&url)
            .header("content-type", PROTOBUF_CONTENT_TYPE)
            .header(REQUEST_ID_HEADER, request_id)
            .timeout(deadline)
            .body(request.encode_to_vec())
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Self::decode_response(response).await
    }

    async fn decode_response<Resp: Message + Default>(
        response: reqwest::Response,
    ) -> Result<Resp, RpcError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if status.is_success() {
            return Resp::decode(bytes.as_ref()).map_err(|e| RpcError::Decode(e.to_string()));
        }

        match RpcFailure::decode(bytes.as_ref()) {
            Ok(failure) => Err(RpcError::Failure {
                code: failure.code,
                message: failure.message,
            }),
            Err(_) => Err(RpcError::Transport(format!(
                "engine returned HTTP {status} with undecodable body"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_maps_to_engine_unavailable() {
        let err = RpcError::Transport("connection refused".into());
        assert_eq!(err.code(), "ENGINE_UNAVAILABLE");
    }

    #[test]
    fn failure_preserves_engine_code() {
        let err = RpcError::Failure {
            code: "FEATURE_DISABLED".into(),
            message: "crypto payments not enabled".into(),
        };
        assert_eq!(err.code(), "FEATURE_DISABLED");
    }

    #[tokio::test]
    async fn unreachable_engine_is_transport_error() {
        let client = EngineClient::new("http://127.0.0.1:1");
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
