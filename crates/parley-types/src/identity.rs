//! Identity types for Parley
//!
//! Identifiers are opaque caller-supplied strings. They are wrapped in
//! distinct types so an account can never be passed where a conversation
//! key is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ParleyError, Result};

/// Macro to generate string-backed ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a string without validation
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consume into the raw identifier
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type!(AccountId, "Identity of an account on the value-transfer ledger");
define_id_type!(ConversationId, "Caller-supplied key of an escrowed conversation");

impl ConversationId {
    /// Parse a conversation id supplied by a caller.
    ///
    /// Only the empty string is rejected; any other content is opaque.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(ParleyError::MissingIdentifier);
        }
        Ok(Self(value))
    }
}
