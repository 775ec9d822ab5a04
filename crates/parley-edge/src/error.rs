//! Edge error mapping
//!
//! The engine speaks stable reason codes; this is where they become HTTP.
//! Auth failures are 401 regardless of which check tripped, rate limits get
//! `Retry-After`, and internal failures always carry the correlation id so a
//! caller can quote it back.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use parley_proto::RpcError;
use parley_types::ParleyError;

pub type EdgeResult<T> = Result<T, EdgeError>;

/// An error leaving the edge as an HTTP response.
#[derive(Debug)]
pub struct EdgeError {
    pub error: ParleyError,
    pub request_id: String,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
}

impl EdgeError {
    pub fn new(error: ParleyError, request_id: String) -> Self {
        Self { error, request_id }
    }

    /// Wrap an RPC failure from the engine, preserving its reason code.
    pub fn from_rpc(error: RpcError, request_id: String) -> Self {
        let parley = match &error {
            RpcError::Failure { code, message } => ParleyError::from_error_code(code, message),
            RpcError::Transport(message) => ParleyError::EngineUnavailable {
                reason: message.clone(),
            },
            RpcError::Decode(message) => ParleyError::internal(message.clone()),
        };
        Self::new(parley, request_id)
    }

    /// HTTP status for this error's reason code.
    pub fn status_code(&self) -> StatusCode {
        match self.error.error_code() {
            "AUTH_MISSING_HEADER" | "AUTH_MALFORMED_ID" | "AUTH_BAD_SIGNATURE"
            | "AUTH_STALE_TIMESTAMP" => StatusCode::UNAUTHORIZED,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "BAD_REQUEST" | "UNKNOWN_CURRENCY" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "FEATURE_DISABLED" => StatusCode::NOT_IMPLEMENTED,
            "STRATEGY_UNAVAILABLE" | "CHAIN_UNAVAILABLE" | "STORE_UNAVAILABLE" => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            "ENGINE_UNAVAILABLE" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.error.error_code().to_string(),
            message: self.error.to_string(),
            request_id: self.request_id,
        };

        let mut response = (status, Json(body)).into_response();

        if let ParleyError::RateLimited { retry_after_secs } = &self.error {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_401() {
        for error in [
            ParleyError::MissingHeader {
                header: "x-signature".into(),
            },
            ParleyError::MalformedIdentity {
                did: "did:key:xyz".into(),
            },
            ParleyError::BadSignature,
            ParleyError::StaleTimestamp { skew_secs: 90 },
        ] {
            let edge = EdgeError::new(error, String::new());
            assert_eq!(edge.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let edge = EdgeError::new(
            ParleyError::RateLimited {
                retry_after_secs: 37,
            },
            "req_1".into(),
        );
        assert_eq!(edge.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let response = edge.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "37"
        );
    }

    #[test]
    fn engine_codes_survive_the_hop() {
        let edge = EdgeError::from_rpc(
            RpcError::Failure {
                code: "FEATURE_DISABLED".into(),
                message: "crypto payments".into(),
            },
            "req_2".into(),
        );
        assert_eq!(edge.status_code(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn unreachable_engine_is_bad_gateway() {
        let edge = EdgeError::from_rpc(
            RpcError::Transport("connect refused".into()),
            "req_3".into(),
        );
        assert_eq!(edge.status_code(), StatusCode::BAD_GATEWAY);
    }
}
