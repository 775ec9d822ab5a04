//! Catalog items
//!
//! The catalog itself is an external store; the engine only ever reads items
//! by id. The floor price is the one field that must never leave the engine.

use serde::{Deserialize, Serialize};

/// A priced catalog item as the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    /// Publicly advertised price.
    pub base_price: f64,
    /// Minimum acceptable price. Never serialized into any caller-visible
    /// structure; strategies receive it, responses must not.
    pub floor_price: f64,
    pub active: bool,
}

impl Item {
    /// Active items must advertise at or above their floor.
    pub fn is_consistent(&self) -> bool {
        !self.active || self.base_price >= self.floor_price
    }
}
