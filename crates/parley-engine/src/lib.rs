//! Parley engine
//!
//! The private tier of the platform. Owns pricing policy (strategy dispatch
//! plus the decision guard), the locked-deal lifecycle, and the chain probe.
//! The edge reaches it only through the binary RPC surface in [`rpc`].
//!
//! Stateless in memory: every durable fact lives in the deal/catalog store,
//! so any number of engine replicas can serve the same traffic. The
//! conditional updates in the deal repository are what keep concurrent
//! settlement checks at-most-once.

pub mod deals;
pub mod rpc;
pub mod service;
pub mod tokens;

pub use deals::{DealService, StatusView};
pub use rpc::{rpc_router, EngineState};
pub use service::NegotiationService;
