//! Detached signature verification
//!
//! The edge never sees private keys; it verifies hex-encoded detached
//! signatures against the key embedded in the caller's DID.

use ed25519_dalek::{Signature as Ed25519Signature, Verifier};

use parley_types::AgentDid;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::verifying_key_from_did;

/// Verify a hex-encoded Ed25519 signature over `message` for a caller DID.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify;
/// `Err` only for structurally invalid inputs.
pub fn verify_detached(did: &AgentDid, message: &[u8], signature_hex: &str) -> CryptoResult<bool> {
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    if signature_bytes.len() != 64 {
        return Err(CryptoError::InvalidSignatureFormat(
            "signature must be 64 bytes".to_string(),
        ));
    }

    let mut sig_array = [0u8; 64];
    sig_array.copy_from_slice(&signature_bytes);
    let signature = Ed25519Signature::from_bytes(&sig_array);

    let verifying_key = verifying_key_from_did(did)?;
    Ok(verifying_key.verify(message, &signature).is_ok())
}
