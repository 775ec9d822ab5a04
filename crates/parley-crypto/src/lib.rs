//! Parley cryptography
//!
//! Everything the platform signs, hashes, or keeps ciphered:
//!
//! - Ed25519 agent key pairs and the detached request signatures the edge
//!   verifies ([`keys`], [`signature`])
//! - the canonical JSON body encoding that makes those signatures stable
//!   across whitespace and key order ([`canonical`])
//! - the authenticated secret box protecting reservation codes at rest
//!   ([`secretbox`])

pub mod canonical;
pub mod error;
pub mod keys;
pub mod secretbox;
pub mod signature;

pub use canonical::{body_hash, canonical_message, canonical_string, parse_strict};
pub use error::{CryptoError, CryptoResult};
pub use keys::AgentKeyPair;
pub use secretbox::SecretBox;
pub use signature::verify_detached;
