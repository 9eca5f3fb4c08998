//! Error types for Parley
//!
//! All failures are explicit and fail closed: an operation that returns an
//! error has applied none of its effects.

use thiserror::Error;

use crate::{AccountId, Amount, Asset, ConversationId};

/// Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Broad category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller sent something unusable
    Input,
    /// The request conflicts with current record state
    Conflict,
    /// The request was not authorized by the refund authority
    Authorization,
    /// Not enough value to perform the request
    Balance,
    /// Storage or encoding failure below the escrow logic
    Infrastructure,
}

/// Parley error types
#[derive(Debug, Clone, Error)]
pub enum ParleyError {
    // ========================================================================
    // Input Errors
    // ========================================================================

    /// Conversation id was empty or absent
    #[error("Must provide conversation_id")]
    MissingIdentifier,

    /// Attached deposit differs from the purchase price
    #[error("Incorrect deposit: expected {expected}, attached {attached}")]
    IncorrectDeposit { expected: Amount, attached: Amount },

    /// Amount string could not be parsed
    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    /// Signed refund message has unusable content
    #[error("Malformed refund message: {reason}")]
    MalformedMessage { reason: String },

    /// Invalid input
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // ========================================================================
    // Record State Errors
    // ========================================================================

    /// A record already exists under this id
    #[error("Conversation {conversation_id} already exists")]
    DuplicateRecord { conversation_id: ConversationId },

    /// No record exists under this id
    #[error("No conversation found for {conversation_id}")]
    RecordNotFound { conversation_id: ConversationId },

    /// The same signed refund message was already applied
    #[error("Refund {digest} has already been applied")]
    RefundAlreadyApplied { digest: String },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Signature did not verify against the authority key
    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    // ========================================================================
    // Balance Errors
    // ========================================================================

    /// Refund asks for more than the record holds
    #[error("Insufficient escrow for {conversation_id}: escrowed {escrowed}, requested {requested}")]
    InsufficientEscrow {
        conversation_id: ConversationId,
        escrowed: Amount,
        requested: Amount,
    },

    /// A transfer would overdraw an account
    #[error("Insufficient {asset} balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: AccountId,
        asset: Asset,
        available: Amount,
        required: Amount,
    },

    /// Account has never held value
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// Balance arithmetic overflowed
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    // ========================================================================
    // Infrastructure Errors
    // ========================================================================

    /// Storage backend failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Stored bytes could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ParleyError {
    pub fn invalid_amount(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingIdentifier
            | Self::IncorrectDeposit { .. }
            | Self::InvalidAmount { .. }
            | Self::MalformedMessage { .. }
            | Self::InvalidInput { .. } => ErrorKind::Input,
            Self::DuplicateRecord { .. }
            | Self::RecordNotFound { .. }
            | Self::RefundAlreadyApplied { .. } => ErrorKind::Conflict,
            Self::InvalidSignature { .. } => ErrorKind::Authorization,
            Self::InsufficientEscrow { .. }
            | Self::InsufficientBalance { .. }
            | Self::AccountNotFound { .. }
            | Self::AmountOverflow => ErrorKind::Balance,
            Self::Storage { .. } | Self::Serialization { .. } | Self::Internal { .. } => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Check if this is a retriable error
    ///
    /// Nothing in Parley retries on its own; this only informs callers.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Internal { .. })
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "MISSING_IDENTIFIER",
            Self::IncorrectDeposit { .. } => "INCORRECT_DEPOSIT",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::MalformedMessage { .. } => "MALFORMED_MESSAGE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::RefundAlreadyApplied { .. } => "REFUND_ALREADY_APPLIED",
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::InsufficientEscrow { .. } => "INSUFFICIENT_ESCROW",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
