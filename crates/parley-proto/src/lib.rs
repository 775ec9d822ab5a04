//! Parley internal wire contract
//!
//! Binary messages exchanged between the edge and the engine. Fields carry
//! explicit protobuf tags so the schema can evolve without breaking either
//! side; the negotiation result and the accepted-offer reveal are `oneof`s,
//! making the variants mutually exclusive on the wire rather than a pair of
//! optional fields.
//!
//! Transport is protobuf-over-HTTP: the engine serves `POST /rpc/v1/*`
//! accepting `application/x-protobuf` bodies, and the correlation id travels
//! in the `x-request-id` header ([`client::EngineClient`]).

pub mod client;
pub mod message;

pub use client::{EngineClient, RpcError};
pub use message::*;

/// Header carrying the correlation id across the RPC hop.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Content type for RPC bodies.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// RPC route paths served by the engine.
pub mod routes {
    pub const NEGOTIATE: &str = "/rpc/v1/negotiate";
    pub const DEAL_STATUS: &str = "/rpc/v1/deal_status";
    pub const HEALTH: &str = "/rpc/v1/health";
}
