//! Receiving wallet
//!
//! The engine's settlement address, derived from a base58 secret loaded once
//! at startup. The signing half exists only to derive the public key; nothing
//! in the current scope signs with it, and it is never logged.

use ed25519_dalek::SigningKey;

use crate::error::ChainError;

pub struct ReceivingWallet {
    signing_key: SigningKey,
    address: String,
    network: String,
}

impl ReceivingWallet {
    /// Load from a base58-encoded secret: either a 64-byte keypair
    /// (secret ∥ public) or a bare 32-byte seed.
    pub fn from_base58(secret: &str, network: impl Into<String>) -> Result<Self, ChainError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| ChainError::Config(format!("receiving key is not base58: {e}")))?;

        let seed: [u8; 32] = match bytes.len() {
            64 => bytes[..32]
                .try_into()
                .map_err(|_| ChainError::Config("malformed keypair bytes".to_string()))?,
            32 => bytes
                .as_slice()
                .try_into()
                .map_err(|_| ChainError::Config("malformed seed bytes".to_string()))?,
            n => {
                return Err(ChainError::Config(format!(
                    "receiving key must decode to 32 or 64 bytes, got {n}"
                )))
            }
        };

        let signing_key = SigningKey::from_bytes(&seed);
        let address = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();

        Ok(Self {
            signing_key,
            address,
            network: network.into(),
        })
    }

    /// The base58 public address payments are sent to.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    #[allow(dead_code)]
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for ReceivingWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivingWallet")
            .field("address", &self.address)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_b58() -> String {
        bs58::encode([7u8; 32]).into_string()
    }

    #[test]
    fn loads_32_byte_seed() {
        let wallet = ReceivingWallet::from_base58(&seed_b58(), "devnet").unwrap();
        assert!(!wallet.address().is_empty());
        assert_eq!(wallet.network(), "devnet");
    }

    #[test]
    fn loads_64_byte_keypair() {
        let signing = SigningKey::from_bytes(&[9u8; 32]);
        let mut keypair = signing.to_bytes().to_vec();
        keypair.extend_from_slice(signing.verifying_key().as_bytes());
        let encoded = bs58::encode(keypair).into_string();

        let wallet = ReceivingWallet::from_base58(&encoded, "mainnet-beta").unwrap();
        assert_eq!(
            wallet.address(),
            bs58::encode(signing.verifying_key().as_bytes()).into_string()
        );
    }

    #[test]
    fn rejects_bad_lengths() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(ReceivingWallet::from_base58(&short, "devnet").is_err());
    }

    #[test]
    fn debug_never_shows_key_material() {
        let wallet = ReceivingWallet::from_base58(&seed_b58(), "devnet").unwrap();
        let debug = format!("{wallet:?}");
        assert!(!debug.contains(&seed_b58()));
    }
}
