// signer.rs — Ed25519 receipt attestation.
//
// Signing is optional: a ledger opened with a signer attests each receipt
// by signing its payload hash. Signatures and public keys are base64 so
// they travel inside JSON receipts and export bundles. Verification is
// detached — any holder of the public key can check a receipt without the
// signing key or the original system.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::LedgerError;

/// Signs receipt payload hashes with an Ed25519 key.
pub struct ReceiptSigner {
    key_pair: Ed25519KeyPair,
}

impl ReceiptSigner {
    /// Generate a fresh key pair. Returns the signer and the PKCS#8
    /// document to persist for reuse across restarts.
    pub fn generate() -> Result<(Self, Vec<u8>), LedgerError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| LedgerError::Signature("key generation failed".to_string()))?;
        let signer = Self::from_pkcs8(pkcs8.as_ref())?;
        Ok((signer, pkcs8.as_ref().to_vec()))
    }

    /// Load a signer from a persisted PKCS#8 document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, LedgerError> {
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| LedgerError::Signature(format!("key rejected: {}", e)))?;
        Ok(Self { key_pair })
    }

    /// Sign a message, returning the base64 signature.
    pub fn sign(&self, message: &str) -> String {
        BASE64.encode(self.key_pair.sign(message.as_bytes()).as_ref())
    }

    /// The base64 public key for detached verification.
    pub fn public_key_b64(&self) -> String {
        BASE64.encode(self.key_pair.public_key().as_ref())
    }
}

/// Verify a base64 signature over a message with a base64 public key.
///
/// Returns Ok(false) for a well-formed signature that does not match;
/// errors only on malformed base64 input.
pub fn verify_signature(
    public_key_b64: &str,
    message: &str,
    signature_b64: &str,
) -> Result<bool, LedgerError> {
    let public_key = BASE64
        .decode(public_key_b64)
        .map_err(|e| LedgerError::Signature(format!("bad public key encoding: {}", e)))?;
    let signature = BASE64
        .decode(signature_b64)
        .map_err(|e| LedgerError::Signature(format!("bad signature encoding: {}", e)))?;

    Ok(UnparsedPublicKey::new(&ED25519, public_key)
        .verify(message.as_bytes(), &signature)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let (signer, _) = ReceiptSigner::generate().unwrap();
        let signature = signer.sign("payload-hash");
        assert!(verify_signature(&signer.public_key_b64(), "payload-hash", &signature).unwrap());
    }

    #[test]
    fn wrong_message_does_not_verify() {
        let (signer, _) = ReceiptSigner::generate().unwrap();
        let signature = signer.sign("payload-hash");
        assert!(!verify_signature(&signer.public_key_b64(), "other", &signature).unwrap());
    }

    #[test]
    fn signer_reloads_from_pkcs8() {
        let (signer, pkcs8) = ReceiptSigner::generate().unwrap();
        let signature = signer.sign("payload-hash");

        let reloaded = ReceiptSigner::from_pkcs8(&pkcs8).unwrap();
        // Same key — the reloaded signer verifies under the same public key.
        assert_eq!(signer.public_key_b64(), reloaded.public_key_b64());
        assert!(
            verify_signature(&reloaded.public_key_b64(), "payload-hash", &signature).unwrap()
        );
    }

    #[test]
    fn malformed_encoding_is_an_error() {
        assert!(verify_signature("%%%", "msg", "also-not-base64!").is_err());
    }
}
