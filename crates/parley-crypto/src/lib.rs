//! Parley Crypto - Cryptographic primitives for the refund authority
//!
//! This crate provides:
//! - Authority key generation and handling (Ed25519)
//! - Hashing (SHA-256)
//! - Detached refund signatures: the authority signs the SHA-256 digest of
//!   the exact UTF-8 bytes of a refund message
//!
//! # Security Invariant
//!
//! **The signature is checked against the bytes that were signed, before any
//! field of the message is interpreted.**

pub mod keys;
pub mod signature;
pub mod hash;

pub use keys::*;
pub use signature::*;
pub use hash::*;

use parley_types::ParleyError;
use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for ParleyError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::VerificationFailed(reason) => ParleyError::invalid_signature(reason),
            other => ParleyError::internal(other.to_string()),
        }
    }
}
