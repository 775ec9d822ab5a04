//! Request authentication
//!
//! Every mutating request carries three headers: the caller's DID, a unix
//! timestamp, and a hex Ed25519 signature over the canonical message
//! `METHOD ∥ PATH ∥ TIMESTAMP ∥ BODY_HASH`. The middleware buffers the body,
//! canonicalizes and hashes it once, verifies the signature against the key
//! embedded in the DID, and stashes both the verified caller and the parsed
//! body in request extensions - handlers must never re-parse the raw bytes,
//! so what they see is exactly the structure that was hashed.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use parley_crypto::{canonical, signature};
use parley_types::{AgentDid, ParleyError};

use crate::error::EdgeError;
use crate::state::EdgeState;

pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Allowed clock skew between caller and edge, in seconds.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 60;

/// Largest request body the edge will buffer for verification.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// The authenticated caller, set by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct VerifiedCaller {
    pub did: AgentDid,
    /// Reputation in [0,1]; populated when an identity service supplies one.
    pub reputation: Option<f64>,
}

/// The canonical parsed request body, set by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct ParsedBody(pub Arc<Value>);

/// Verify a request's signature headers against its raw body.
///
/// Pure with respect to `now`, so the timestamp window is testable without a
/// clock. Returns the verified caller and the parsed body (when present).
pub fn verify_request(
    method: &str,
    path: &str,
    agent_id: Option<&str>,
    timestamp: Option<&str>,
    sig: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(VerifiedCaller, Option<Value>), ParleyError> {
    let agent_id = require_header(agent_id, AGENT_ID_HEADER)?;
    let timestamp = require_header(timestamp, TIMESTAMP_HEADER)?;
    let sig = require_header(sig, SIGNATURE_HEADER)?;

    let did = AgentDid::parse(agent_id)?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ParleyError::StaleTimestamp { skew_secs: 0 })?;
    let skew = (now - ts).abs();
    if skew > TIMESTAMP_TOLERANCE_SECS {
        return Err(ParleyError::StaleTimestamp { skew_secs: skew });
    }

    let (hash, parsed) =
        canonical::body_hash(body).map_err(|e| ParleyError::bad_request(e.to_string()))?;
    let message = canonical::canonical_message(method, path, timestamp, &hash);

    let valid = signature::verify_detached(&did, message.as_bytes(), sig)
        .map_err(|_| ParleyError::BadSignature)?;
    if !valid {
        return Err(ParleyError::BadSignature);
    }

    Ok((
        VerifiedCaller {
            did,
            reputation: None,
        },
        parsed,
    ))
}

fn require_header<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ParleyError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ParleyError::MissingHeader {
            header: name.to_string(),
        }
    })
}

/// Middleware enforcing signature verification on every request it wraps.
pub async fn auth_middleware(
    State(_state): State<Arc<EdgeState>>,
    request: Request,
    next: Next,
) -> Result<Response, EdgeError> {
    let request_id = header_string(&request, "x-request-id");
    let (parts, body) = request.into_parts();

    let agent_id = header_str(&parts, AGENT_ID_HEADER);
    let timestamp = header_str(&parts, TIMESTAMP_HEADER);
    let sig = header_str(&parts, SIGNATURE_HEADER);

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            EdgeError::new(
                ParleyError::bad_request(format!("unreadable body: {e}")),
                request_id.clone(),
            )
        })?;

    let now = chrono::Utc::now().timestamp();
    let result = verify_request(
        parts.method.as_str(),
        parts.uri.path(),
        agent_id.as_deref(),
        timestamp.as_deref(),
        sig.as_deref(),
        &bytes,
        now,
    );

    let (caller, parsed) = match result {
        Ok(ok) => ok,
        Err(e) => {
            warn!(
                request_id = %request_id,
                path = parts.uri.path(),
                code = e.error_code(),
                "request_authentication_failed"
            );
            metrics::counter!("parley_auth_failures_total", "code" => e.error_code())
                .increment(1);
            return Err(EdgeError::new(e, request_id));
        }
    };

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(caller);
    if let Some(value) = parsed {
        request.extensions_mut().insert(ParsedBody(Arc::new(value)));
    }

    Ok(next.run(request).await)
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn header_string(request: &Request, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedCaller
where
    S: Send + Sync,
{
    type Rejection = EdgeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedCaller>()
            .cloned()
            .ok_or_else(|| {
                EdgeError::new(
                    ParleyError::MissingHeader {
                        header: AGENT_ID_HEADER.to_string(),
                    },
                    String::new(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_crypto::AgentKeyPair;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn signed(
        kp: &AgentKeyPair,
        method: &str,
        path: &str,
        body: Option<&Value>,
        ts: i64,
    ) -> (String, String, String, Vec<u8>) {
        let (did, ts, sig) = kp.sign_request(method, path, body, ts).unwrap();
        let bytes = body
            .map(|b| serde_json::to_vec(b).unwrap())
            .unwrap_or_default();
        (did, ts, sig, bytes)
    }

    #[test]
    fn valid_request_verifies() {
        let kp = AgentKeyPair::generate();
        let body = json!({"item_id": "room-101", "bid_amount": 160.0});
        let (did, ts, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", Some(&body), NOW);

        let (caller, parsed) = verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW,
        )
        .unwrap();

        assert_eq!(caller.did.to_string(), did);
        assert_eq!(parsed.unwrap()["item_id"], "room-101");
    }

    #[test]
    fn reformatted_body_still_verifies() {
        let kp = AgentKeyPair::generate();
        let body = json!({"item_id": "room-101", "bid_amount": 160.0});
        let (did, ts, sig, _) = signed(&kp, "POST", "/v1/negotiate", Some(&body), NOW);

        // Same structure, different whitespace and key order.
        let reordered = br#"{  "bid_amount": 160.0, "item_id": "room-101"  }"#;
        assert!(verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            reordered,
            NOW,
        )
        .is_ok());
    }

    #[test]
    fn bodyless_request_verifies() {
        let kp = AgentKeyPair::generate();
        let path = "/v1/deals/0000/status";
        let (did, ts, sig, bytes) = signed(&kp, "POST", path, None, NOW);

        let (_, parsed) =
            verify_request("POST", path, Some(&did), Some(&ts), Some(&sig), &bytes, NOW).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn missing_header_fails() {
        let kp = AgentKeyPair::generate();
        let (did, ts, _, bytes) = signed(&kp, "POST", "/v1/negotiate", None, NOW);

        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            None,
            &bytes,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_MISSING_HEADER");
    }

    #[test]
    fn malformed_did_fails() {
        let kp = AgentKeyPair::generate();
        let (_, ts, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", None, NOW);

        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some("did:key:tooshort"),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_MALFORMED_ID");
    }

    #[test]
    fn timestamp_window_is_sixty_seconds() {
        let kp = AgentKeyPair::generate();

        for (skew, ok) in [(0, true), (60, true), (-60, true), (61, false), (-61, false)] {
            let ts = NOW - skew;
            let (did, ts_s, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", None, ts);
            let result = verify_request(
                "POST",
                "/v1/negotiate",
                Some(&did),
                Some(&ts_s),
                Some(&sig),
                &bytes,
                NOW,
            );
            assert_eq!(result.is_ok(), ok, "skew {skew}");
            if !ok {
                assert_eq!(result.unwrap_err().error_code(), "AUTH_STALE_TIMESTAMP");
            }
        }
    }

    #[test]
    fn replayed_request_expires() {
        let kp = AgentKeyPair::generate();
        let body = json!({"item_id": "room-101", "bid_amount": 160.0});
        let (did, ts, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", Some(&body), NOW);

        // Fully valid request replayed 120 seconds later.
        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW + 120,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_STALE_TIMESTAMP");
    }

    #[test]
    fn tampered_body_fails() {
        let kp = AgentKeyPair::generate();
        let body = json!({"item_id": "room-101", "bid_amount": 160.0});
        let (did, ts, sig, _) = signed(&kp, "POST", "/v1/negotiate", Some(&body), NOW);

        let tampered = br#"{"item_id":"room-101","bid_amount":1.0}"#;
        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            tampered,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_BAD_SIGNATURE");
    }

    #[test]
    fn tampered_path_fails() {
        let kp = AgentKeyPair::generate();
        let (did, ts, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", None, NOW);

        let err = verify_request(
            "POST",
            "/v1/other",
            Some(&did),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_BAD_SIGNATURE");
    }

    #[test]
    fn wrong_signer_fails() {
        let signer = AgentKeyPair::generate();
        let imposter = AgentKeyPair::generate();
        let (_, ts, sig, bytes) = signed(&signer, "POST", "/v1/negotiate", None, NOW);

        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some(imposter.did().as_str()),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_BAD_SIGNATURE");
    }

    #[test]
    fn duplicate_body_keys_rejected() {
        let kp = AgentKeyPair::generate();
        let (did, ts, sig, _) = signed(&kp, "POST", "/v1/negotiate", None, NOW);

        let err = verify_request(
            "POST",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            br#"{"a":1,"a":2}"#,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn lowercase_method_verifies_defensively() {
        let kp = AgentKeyPair::generate();
        let (did, ts, sig, bytes) = signed(&kp, "POST", "/v1/negotiate", None, NOW);

        // Verifier uppercases, so a lowercase method string still matches a
        // signature made over the uppercase form.
        assert!(verify_request(
            "post",
            "/v1/negotiate",
            Some(&did),
            Some(&ts),
            Some(&sig),
            &bytes,
            NOW,
        )
        .is_ok());
    }
}
