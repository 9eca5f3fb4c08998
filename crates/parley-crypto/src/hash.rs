//! Hashing utilities for Parley

use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest
pub const DIGEST_LEN: usize = 32;

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
