//! Parley shared types
//!
//! Domain types used across the edge and engine tiers: caller identities,
//! currencies, negotiation decisions, and the locked-deal lifecycle.
//!
//! The engine owns all writes to deals; the edge only ever sees the public
//! projection of a deal (payment instructions and status views). Floor prices
//! live in [`Item`] and must never cross the engine boundary.

pub mod currency;
pub mod deal;
pub mod decision;
pub mod error;
pub mod identity;
pub mod item;

pub use currency::{CryptoCurrency, FIAT_CURRENCIES};
pub use deal::{DealSecret, DealStatus, PaymentInstructions, PaymentProof};
pub use decision::{Decision, Reveal, Verdict};
pub use error::{ParleyError, Result};
pub use identity::AgentDid;
pub use item::Item;
