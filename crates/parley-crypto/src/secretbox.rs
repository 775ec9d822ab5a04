//! Authenticated secret encryption
//!
//! Reservation codes are stored only as ciphertext. The box uses AES-256-GCM
//! with a random 96-bit nonce prepended to each ciphertext; the key is a
//! process-scoped secret loaded once at startup and never logged.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{CryptoError, CryptoResult};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric authenticated cipher for reservation-code secrets.
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Build from a base64url-encoded 32-byte key.
    pub fn new(encoded_key: &str) -> CryptoResult<Self> {
        let key_bytes = URL_SAFE_NO_PAD
            .decode(encoded_key.trim_end_matches('='))
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;

        if key_bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                key_bytes.len()
            )));
        }

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a plaintext secret; output is `nonce ∥ ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce ∥ ciphertext` back to the plaintext secret.
    ///
    /// Fails on a wrong key or any tampering, per the AEAD tag.
    pub fn decrypt(&self, data: &[u8]) -> CryptoResult<String> {
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::DecryptionFailed(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed("invalid ciphertext or wrong key".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// Generate a fresh base64url key for configuration.
pub fn generate_key() -> String {
    use rand::RngCore;
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    URL_SAFE_NO_PAD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let sb = SecretBox::new(&generate_key()).unwrap();
        let ct = sb.encrypt("RES-abc123").unwrap();
        assert_eq!(sb.decrypt(&ct).unwrap(), "RES-abc123");
    }

    #[test]
    fn ciphertexts_are_nondeterministic() {
        let sb = SecretBox::new(&generate_key()).unwrap();
        let a = sb.encrypt("same").unwrap();
        let b = sb.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let a = SecretBox::new(&generate_key()).unwrap();
        let b = SecretBox::new(&generate_key()).unwrap();
        let ct = a.encrypt("secret").unwrap();
        assert!(b.decrypt(&ct).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let sb = SecretBox::new(&generate_key()).unwrap();
        let mut ct = sb.encrypt("secret").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(sb.decrypt(&ct).is_err());
    }

    #[test]
    fn rejects_short_key() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 16]);
        assert!(SecretBox::new(&short).is_err());
    }
}
