//! Caller identities
//!
//! Agents identify themselves with a `did:key:<hex>` string that embeds their
//! Ed25519 verifying key directly. There is no registration step: the id is
//! self-certifying and the key is derivable from the id alone.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParleyError;

/// Prefix every caller id must carry.
pub const DID_PREFIX: &str = "did:key:";

/// Hex length of a 32-byte Ed25519 verifying key.
const KEY_HEX_LEN: usize = 64;

/// A validated `did:key:<64 hex chars>` caller identity.
///
/// Construction goes through [`AgentDid::parse`], so holding a value of this
/// type implies the embedded key decodes to exactly 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentDid(String);

impl AgentDid {
    /// Parse and validate a caller id.
    pub fn parse(s: &str) -> Result<Self, ParleyError> {
        let key_part = s
            .strip_prefix(DID_PREFIX)
            .ok_or_else(|| ParleyError::MalformedIdentity { did: s.to_string() })?;

        if key_part.len() != KEY_HEX_LEN
            || !key_part.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(ParleyError::MalformedIdentity { did: s.to_string() });
        }

        Ok(Self(s.to_string()))
    }

    /// Build the id for a raw verifying key.
    pub fn from_public_key(key: &[u8; 32]) -> Self {
        Self(format!("{}{}", DID_PREFIX, hex::encode(key)))
    }

    /// The embedded Ed25519 verifying key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Parse validated the hex portion, so this always yields 32 bytes.
        let decoded = hex::decode(&self.0[DID_PREFIX.len()..]).unwrap_or_default();
        if decoded.len() == out.len() {
            out.copy_from_slice(&decoded);
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
