//! Edge application state

use parley_proto::EngineClient;

use crate::rate_limit::RateLimiter;

/// Shared state for edge handlers and middleware.
pub struct EdgeState {
    /// RPC client to the engine tier.
    pub engine: EngineClient,
    /// Per-identity request limiter.
    pub limiter: RateLimiter,
}

impl EdgeState {
    pub fn new(engine: EngineClient, limiter: RateLimiter) -> Self {
        Self { engine, limiter }
    }
}
