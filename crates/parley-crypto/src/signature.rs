//! Detached refund signatures
//!
//! The refund authority signs `sha256(message)`, where `message` is the
//! exact UTF-8 string later submitted with the refund. Verification runs on
//! a digest of the submitted bytes, never on a re-serialized structure.

use std::sync::Arc;

use crate::{sha256, AuthorityKey, AuthorityKeypair, CryptoError, CryptoResult, DIGEST_LEN};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SIGNATURE_LENGTH};
use parley_types::RefundMessage;
use serde::{Deserialize, Serialize};

/// Signature scheme provider
pub trait SignatureScheme: Send + Sync {
    /// Digest of the message bytes that get signed
    fn digest(&self, message: &[u8]) -> [u8; DIGEST_LEN];

    /// Whether `signature` is valid for `digest` under `public_key`
    fn verify(&self, signature: &[u8], digest: &[u8; DIGEST_LEN], public_key: &AuthorityKey) -> bool;
}

/// Ed25519 over SHA-256 digests
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Sha256;

impl SignatureScheme for Ed25519Sha256 {
    fn digest(&self, message: &[u8]) -> [u8; DIGEST_LEN] {
        sha256(message)
    }

    fn verify(&self, signature: &[u8], digest: &[u8; DIGEST_LEN], public_key: &AuthorityKey) -> bool {
        let Ok(bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
            return false;
        };
        let signature = Ed25519Signature::from_bytes(&bytes);
        // strict verification rejects small-order keys and non-canonical R/s
        public_key
            .verifying_key()
            .verify_strict(digest, &signature)
            .is_ok()
    }
}

/// A refund message together with its detached signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRefund {
    /// The exact string that was signed
    pub refund_message: String,
    /// 64-byte Ed25519 signature over `sha256(refund_message)`
    pub signature: Vec<u8>,
}

impl AuthorityKeypair {
    /// Sign a precomputed digest
    pub fn sign_digest(&self, digest: &[u8; DIGEST_LEN]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key().sign(digest).to_bytes()
    }

    /// Sign the SHA-256 digest of an arbitrary message string
    pub fn sign_message(&self, message: &str) -> [u8; SIGNATURE_LENGTH] {
        self.sign_digest(&sha256(message.as_bytes()))
    }

    /// Encode a refund canonically and sign it
    pub fn sign_refund(&self, refund: &RefundMessage) -> SignedRefund {
        let refund_message = refund.canonical_json();
        let signature = self.sign_message(&refund_message).to_vec();
        SignedRefund {
            refund_message,
            signature,
        }
    }
}

/// Checks refund authorizations against the configured authority key
#[derive(Clone)]
pub struct RefundVerifier {
    scheme: Arc<dyn SignatureScheme>,
    authority: AuthorityKey,
}

impl RefundVerifier {
    /// Verifier using Ed25519 over SHA-256
    pub fn new(authority: AuthorityKey) -> Self {
        Self::with_scheme(Arc::new(Ed25519Sha256), authority)
    }

    pub fn with_scheme(scheme: Arc<dyn SignatureScheme>, authority: AuthorityKey) -> Self {
        Self { scheme, authority }
    }

    pub fn authority(&self) -> &AuthorityKey {
        &self.authority
    }

    /// Authenticate a submitted message.
    ///
    /// Returns the digest of the message bytes on success so callers can key
    /// receipts by exactly what was authorized.
    pub fn authenticate(&self, message: &str, signature: &[u8]) -> CryptoResult<[u8; DIGEST_LEN]> {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(CryptoError::VerificationFailed(format!(
                "Signature must be {} bytes, got {}",
                SIGNATURE_LENGTH,
                signature.len()
            )));
        }

        let digest = self.scheme.digest(message.as_bytes());
        if !self.scheme.verify(signature, &digest, &self.authority) {
            return Err(CryptoError::VerificationFailed(
                "Signature does not match refund authority".to_string(),
            ));
        }
        Ok(digest)
    }
}

impl std::fmt::Debug for RefundVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefundVerifier")
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}
