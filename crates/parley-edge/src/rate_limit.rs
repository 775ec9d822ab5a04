//! Per-identity rate limiting
//!
//! Fixed 60-second windows keyed by `floor(now/60)`: at most 100 accepted
//! requests per caller per window, reset at the minute boundary. The counter
//! lives in Redis (atomic INCR with a TTL on first increment) so every edge
//! replica shares one view; a single-process in-memory store exists for
//! development. An unreachable cache fails open - a stateless edge that
//! fails closed would be a trivial denial of service.

use axum::{extract::{Request, State}, middleware::Next, response::Response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use parley_db::CacheManager;
use parley_types::ParleyError;

use crate::auth::VerifiedCaller;
use crate::error::EdgeError;
use crate::state::EdgeState;

/// Accepted requests per caller per window.
pub const REQUESTS_PER_WINDOW: i64 = 100;

/// Window length in seconds.
pub const WINDOW_SECS: i64 = 60;

enum Store {
    Redis(CacheManager),
    /// Single-process fallback for development.
    Memory(Mutex<HashMap<String, (i64, i64)>>),
}

pub struct RateLimiter {
    store: Store,
    limit: i64,
}

/// Outcome of a rate-limit check.
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateLimiter {
    /// Shared limiter over Redis; correct across edge replicas.
    pub fn redis(cache: CacheManager) -> Self {
        Self {
            store: Store::Redis(cache),
            limit: REQUESTS_PER_WINDOW,
        }
    }

    /// In-memory limiter for single-process development runs.
    pub fn in_memory() -> Self {
        Self {
            store: Store::Memory(Mutex::new(HashMap::new())),
            limit: REQUESTS_PER_WINDOW,
        }
    }

    #[cfg(test)]
    fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Count a request for `caller` at wall-clock `now`.
    pub async fn check(&self, caller: &str, now: i64) -> RateDecision {
        let window = now.div_euclid(WINDOW_SECS);
        let retry_after_secs = (WINDOW_SECS - now.rem_euclid(WINDOW_SECS)) as u64;

        let count = match &self.store {
            Store::Redis(cache) => {
                let key = format!("{caller}:{window}");
                match cache.rate_limit_incr(&key, WINDOW_SECS as u64).await {
                    Ok(count) => count,
                    Err(e) => {
                        // Fail open: admit the request, never turn a cache
                        // outage into an outage of the edge itself.
                        warn!(error = %e, "rate_limiter_unavailable");
                        metrics::counter!("parley_rate_limiter_unavailable_total").increment(1);
                        return RateDecision::Allowed;
                    }
                }
            }
            Store::Memory(buckets) => {
                let mut buckets = buckets.lock().await;
                let entry = buckets.entry(caller.to_string()).or_insert((window, 0));
                if entry.0 != window {
                    *entry = (window, 0);
                }
                entry.1 += 1;
                entry.1
            }
        };

        if count > self.limit {
            RateDecision::Limited { retry_after_secs }
        } else {
            RateDecision::Allowed
        }
    }
}

/// Middleware applying the limiter to the authenticated caller.
///
/// Runs after [`crate::auth::auth_middleware`], so only requests that passed
/// signature verification consume window slots.
pub async fn rate_limit_middleware(
    State(state): State<Arc<EdgeState>>,
    request: Request,
    next: Next,
) -> Result<Response, EdgeError> {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(caller) = request.extensions().get::<VerifiedCaller>() else {
        return Err(EdgeError::new(
            ParleyError::internal("rate limiter ran before authentication"),
            request_id,
        ));
    };
    let caller_did = caller.did.to_string();

    let now = chrono::Utc::now().timestamp();
    match state.limiter.check(&caller_did, now).await {
        RateDecision::Allowed => Ok(next.run(request).await),
        RateDecision::Limited { retry_after_secs } => {
            warn!(
                request_id = %request_id,
                agent_did = %caller_did,
                retry_after_secs,
                "rate_limit_exceeded"
            );
            metrics::counter!("parley_rate_limited_total").increment(1);
            Err(EdgeError::new(
                ParleyError::RateLimited { retry_after_secs },
                request_id,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_010;

    #[tokio::test]
    async fn admits_up_to_the_limit() {
        let limiter = RateLimiter::in_memory().with_limit(5);

        for _ in 0..5 {
            assert!(matches!(
                limiter.check("did:key:abc", NOW).await,
                RateDecision::Allowed
            ));
        }

        match limiter.check("did:key:abc", NOW).await {
            RateDecision::Limited { retry_after_secs } => {
                // 10 seconds into the window leaves 50 until the boundary.
                assert_eq!(retry_after_secs, 50);
            }
            RateDecision::Allowed => panic!("expected limit"),
        }
    }

    #[tokio::test]
    async fn window_rolls_over_at_minute_boundary() {
        let limiter = RateLimiter::in_memory().with_limit(2);

        for _ in 0..2 {
            limiter.check("caller", NOW).await;
        }
        assert!(matches!(
            limiter.check("caller", NOW).await,
            RateDecision::Limited { .. }
        ));

        // Next minute window starts a fresh count.
        let next_window = (NOW / 60 + 1) * 60;
        assert!(matches!(
            limiter.check("caller", next_window).await,
            RateDecision::Allowed
        ));
    }

    #[tokio::test]
    async fn callers_are_independent() {
        let limiter = RateLimiter::in_memory().with_limit(1);

        limiter.check("caller-a", NOW).await;
        assert!(matches!(
            limiter.check("caller-a", NOW).await,
            RateDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check("caller-b", NOW).await,
            RateDecision::Allowed
        ));
    }

    #[tokio::test]
    async fn full_budget_admits_exactly_one_hundred() {
        let limiter = RateLimiter::in_memory();

        let mut admitted = 0;
        for _ in 0..101 {
            if matches!(limiter.check("caller", NOW).await, RateDecision::Allowed) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 100);
    }
}
