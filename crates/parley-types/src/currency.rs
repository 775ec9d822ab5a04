//! Currency types
//!
//! Negotiation bids are quoted in fiat; settlement happens in one of the
//! supported cryptocurrencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParleyError;

/// Fiat currency codes accepted on negotiation requests.
pub const FIAT_CURRENCIES: &[&str] = &["USD"];

/// Settlement currencies the chain watcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CryptoCurrency {
    /// Native Solana
    SOL,
    /// USD Coin (SPL token)
    USDC,
}

impl CryptoCurrency {
    /// Ticker code used on the wire and in payment instructions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SOL => "SOL",
            Self::USDC => "USDC",
        }
    }

    /// Smallest-unit decimal places.
    pub fn decimals(&self) -> u8 {
        match self {
            Self::SOL => 9,
            Self::USDC => 6,
        }
    }

    /// Whether this currency is pegged 1:1 to USD.
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::USDC)
    }
}

impl fmt::Display for CryptoCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for CryptoCurrency {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOL" => Ok(Self::SOL),
            "USDC" => Ok(Self::USDC),
            other => Err(ParleyError::UnknownCurrency {
                code: other.to_string(),
            }),
        }
    }
}
