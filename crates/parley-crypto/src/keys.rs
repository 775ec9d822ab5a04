//! Agent key pairs
//!
//! An agent's identity is its Ed25519 key pair; the DID is derived from the
//! verifying key. Signing a request produces the three headers the edge
//! authenticator checks.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde_json::Value;

use parley_types::AgentDid;

use crate::canonical;
use crate::error::{CryptoError, CryptoResult};

/// An Ed25519 key pair with DID derivation and request signing.
#[derive(Clone)]
pub struct AgentKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

/// The three signature headers, in wire order: caller id, timestamp, signature.
pub type SignatureHeaders = (String, String, String);

impl AgentKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Restore from signing key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// The `did:key:<hex>` identity for this key pair.
    pub fn did(&self) -> AgentDid {
        AgentDid::from_public_key(self.verifying_key.as_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Sign a raw canonical message.
    pub fn sign_message(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a request at a given unix timestamp, returning the headers to send.
    ///
    /// `body` is the JSON value that will be sent; pass `None` for bodyless
    /// requests such as status polls.
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        timestamp: i64,
    ) -> CryptoResult<SignatureHeaders> {
        let body_bytes = match body {
            Some(value) => canonical::canonical_string(value).into_bytes(),
            None => Vec::new(),
        };
        let (hash, _) = canonical::body_hash(&body_bytes)?;
        let ts = timestamp.to_string();
        let message = canonical::canonical_message(method, path, &ts, &hash);
        let signature = self.sign_message(message.as_bytes());
        Ok((self.did().to_string(), ts, signature))
    }

    /// The signing key bytes, for secure storage only.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// Parse a 32-byte verifying key out of DID key material.
pub fn verifying_key_from_did(did: &AgentDid) -> CryptoResult<VerifyingKey> {
    VerifyingKey::from_bytes(&did.public_key_bytes())
        .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
}
