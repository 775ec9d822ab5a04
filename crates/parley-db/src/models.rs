//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use parley_types::{DealStatus, Item, ParleyError};

/// A catalog item row. The engine only ever reads these.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbItem {
    pub id: String,
    pub name: String,
    pub base_price: f64,
    /// Hidden floor price; never crosses the engine boundary.
    pub floor_price: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbItem> for Item {
    fn from(row: DbItem) -> Self {
        Item {
            id: row.id,
            name: row.name,
            base_price: row.base_price,
            floor_price: row.floor_price,
            active: row.active,
        }
    }
}

/// A locked deal row. Created PENDING at accept time, mutated only by the
/// conditional PAID/EXPIRED updates, and never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDeal {
    pub id: Uuid,
    pub item_id: String,
    /// Name snapshot taken at lock time; the catalog may change after.
    pub item_name: String,
    /// Agreed fiat price.
    pub final_price: f64,
    /// Converted settlement amount the transfer must match.
    pub crypto_amount: f64,
    pub currency: String,
    /// Globally unique transfer memo binding payment to this deal.
    pub payment_memo: String,
    pub wallet_address: String,
    pub network: String,
    /// AEAD ciphertext of the reservation code.
    pub secret_ciphertext: Vec<u8>,
    pub status: String,
    pub buyer_did: Option<String>,
    pub transaction_hash: Option<String>,
    pub block_number: Option<String>,
    pub from_address: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbDeal {
    /// Typed settlement status of this row.
    pub fn deal_status(&self) -> Result<DealStatus, ParleyError> {
        self.status.parse()
    }
}
