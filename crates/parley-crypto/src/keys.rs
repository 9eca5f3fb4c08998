//! Key management for the refund authority

use crate::{CryptoError, CryptoResult};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Signing key pair held by the refund authority
///
/// Lives off the escrow's execution path; only the authority tooling and
/// tests construct one.
#[derive(Clone)]
pub struct AuthorityKeypair {
    signing_key: SigningKey,
}

impl AuthorityKeypair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from a hex-encoded 32-byte seed
    pub fn from_seed_hex(seed_hex: &str) -> CryptoResult<Self> {
        let seed: [u8; SECRET_KEY_LENGTH] = hex::decode(seed_hex.trim())
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat("Secret key must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Get the public half
    pub fn public_key(&self) -> AuthorityKey {
        AuthorityKey(self.signing_key.verifying_key())
    }

    /// Get the seed as a hex string (for secure storage only!)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for AuthorityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Trusted public key of the refund authority
///
/// Injected through configuration; hex-encoded in config files and JSON.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AuthorityKey(VerifyingKey);

impl AuthorityKey {
    /// Parse 32 raw bytes; rejects encodings that are not curve points
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> CryptoResult<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
    }

    /// Parse a hex-encoded 32-byte key
    pub fn from_hex(key_hex: &str) -> CryptoResult<Self> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = hex::decode(key_hex.trim())
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat("Public key must be 32 bytes".to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.0.as_bytes()
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl fmt::Debug for AuthorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityKey({})", self.to_hex())
    }
}

impl fmt::Display for AuthorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AuthorityKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> CryptoResult<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for AuthorityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AuthorityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key_hex = String::deserialize(deserializer)?;
        Self::from_hex(&key_hex).map_err(serde::de::Error::custom)
    }
}
