//! Error types for Parley
//!
//! The engine converts every failure to one of these variants at its RPC
//! boundary; the edge maps the stable `error_code()` strings onto HTTP
//! statuses. Messages never carry secrets or floor prices.

use thiserror::Error;

/// Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Platform error taxonomy
#[derive(Debug, Clone, Error)]
pub enum ParleyError {
    // ========================================================================
    // Authentication
    // ========================================================================

    /// A required signature header is absent
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    /// Caller id does not match `did:key:<64 hex chars>`
    #[error("Malformed caller identity: {did}")]
    MalformedIdentity { did: String },

    /// Signature does not verify over the canonical message
    #[error("Signature verification failed")]
    BadSignature,

    /// Request timestamp outside the replay window
    #[error("Request timestamp outside the accepted window ({skew_secs}s skew)")]
    StaleTimestamp { skew_secs: i64 },

    // ========================================================================
    // Throttling
    // ========================================================================

    /// Caller exceeded the per-identity request window
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ========================================================================
    // Validation
    // ========================================================================

    /// Malformed or out-of-range request field
    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    /// Currency code outside the accepted set
    #[error("Unknown currency: {code}")]
    UnknownCurrency { code: String },

    /// Deal id does not exist
    #[error("Deal {deal_id} not found")]
    DealNotFound { deal_id: String },

    /// Endpoint gated behind a disabled feature toggle
    #[error("Feature disabled: {feature}")]
    FeatureDisabled { feature: String },

    // ========================================================================
    // Dependencies
    // ========================================================================

    /// Pricing strategy could not produce a decision
    #[error("Pricing strategy unavailable: {reason}")]
    StrategyUnavailable { reason: String },

    /// Chain RPC unreachable or structurally broken
    #[error("Chain unavailable: {reason}")]
    ChainUnavailable { reason: String },

    /// Deal or catalog store unreachable
    #[error("Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Edge could not reach the engine
    #[error("Engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    // ========================================================================
    // Everything else
    // ========================================================================

    /// Unclassified failure; correlation id is attached at the boundary
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ParleyError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable reason code for the RPC boundary and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingHeader { .. } => "AUTH_MISSING_HEADER",
            Self::MalformedIdentity { .. } => "AUTH_MALFORMED_ID",
            Self::BadSignature => "AUTH_BAD_SIGNATURE",
            Self::StaleTimestamp { .. } => "AUTH_STALE_TIMESTAMP",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::UnknownCurrency { .. } => "UNKNOWN_CURRENCY",
            Self::DealNotFound { .. } => "NOT_FOUND",
            Self::FeatureDisabled { .. } => "FEATURE_DISABLED",
            Self::StrategyUnavailable { .. } => "STRATEGY_UNAVAILABLE",
            Self::ChainUnavailable { .. } => "CHAIN_UNAVAILABLE",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::EngineUnavailable { .. } => "ENGINE_UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Rebuild a variant from a reason code that crossed the RPC boundary.
    pub fn from_error_code(code: &str, message: &str) -> Self {
        match code {
            "AUTH_MISSING_HEADER" => Self::MissingHeader {
                header: message.to_string(),
            },
            "AUTH_MALFORMED_ID" => Self::MalformedIdentity {
                did: message.to_string(),
            },
            "AUTH_BAD_SIGNATURE" => Self::BadSignature,
            "AUTH_STALE_TIMESTAMP" => Self::StaleTimestamp { skew_secs: 0 },
            "RATE_LIMITED" => Self::RateLimited {
                retry_after_secs: 0,
            },
            "BAD_REQUEST" => Self::bad_request(message),
            "UNKNOWN_CURRENCY" => Self::UnknownCurrency {
                code: message.to_string(),
            },
            "NOT_FOUND" => Self::DealNotFound {
                deal_id: message.to_string(),
            },
            "FEATURE_DISABLED" => Self::FeatureDisabled {
                feature: message.to_string(),
            },
            "STRATEGY_UNAVAILABLE" => Self::StrategyUnavailable {
                reason: message.to_string(),
            },
            "CHAIN_UNAVAILABLE" => Self::ChainUnavailable {
                reason: message.to_string(),
            },
            "STORE_UNAVAILABLE" => Self::StoreUnavailable {
                reason: message.to_string(),
            },
            "ENGINE_UNAVAILABLE" => Self::EngineUnavailable {
                reason: message.to_string(),
            },
            _ => Self::internal(message),
        }
    }

    /// Whether a client could reasonably retry the same request.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::StrategyUnavailable { .. }
                | Self::ChainUnavailable { .. }
                | Self::StoreUnavailable { .. }
                | Self::EngineUnavailable { .. }
        )
    }
}
