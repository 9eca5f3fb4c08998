//! Storage backends for the escrow
//!
//! A backend owns both the key-value keyspaces and the balances, so it can
//! apply record changes and value transfers in one critical section.

pub mod memory;
pub mod persistent;

use std::fmt;

use async_trait::async_trait;
use parley_ledger::{LedgerEntry, Transfer};
use parley_types::{AccountId, Amount, Asset, ParleyError, Result};

/// Named keyspace within a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// conversation id -> stored escrow record
    Conversations,
    /// hex digest of an applied refund message -> refund receipt
    RefundReceipts,
}

impl Keyspace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversations => "conversations",
            Self::RefundReceipts => "refund_receipts",
        }
    }

    /// Error reported when a create finds `key` already present
    pub fn occupied(&self, key: &str) -> ParleyError {
        match self {
            Self::Conversations => ParleyError::DuplicateRecord {
                conversation_id: key.into(),
            },
            Self::RefundReceipts => ParleyError::RefundAlreadyApplied {
                digest: key.to_string(),
            },
        }
    }

    /// Error reported when a guarded delete does not find the expected value
    pub fn missing(&self, key: &str) -> ParleyError {
        match self {
            Self::Conversations => ParleyError::RecordNotFound {
                conversation_id: key.into(),
            },
            Self::RefundReceipts => {
                ParleyError::storage(format!("refund receipt {key} changed underneath commit"))
            }
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record-level change inside a commit
///
/// There is no overwrite: values are created once and removed whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Insert `value`; fails if `key` is already present
    Create {
        keyspace: Keyspace,
        key: String,
        value: Vec<u8>,
    },
    /// Remove `key`; fails unless the stored value equals `expected`
    Delete {
        keyspace: Keyspace,
        key: String,
        expected: Vec<u8>,
    },
}

impl StoreOp {
    pub fn keyspace(&self) -> Keyspace {
        match self {
            Self::Create { keyspace, .. } | Self::Delete { keyspace, .. } => *keyspace,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Create { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    /// Check this op's guard against the value currently stored under its key
    pub fn check(&self, current: Option<&[u8]>) -> Result<()> {
        match self {
            Self::Create { keyspace, key, .. } => match current {
                Some(_) => Err(keyspace.occupied(key)),
                None => Ok(()),
            },
            Self::Delete {
                keyspace,
                key,
                expected,
            } => match current {
                Some(stored) if stored == expected.as_slice() => Ok(()),
                _ => Err(keyspace.missing(key)),
            },
        }
    }
}

/// Everything a single operation applies, as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedCommit {
    pub ops: Vec<StoreOp>,
    pub transfers: Vec<Transfer>,
}

impl StagedCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, op: StoreOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn transfer(mut self, transfer: Transfer) -> Self {
        self.transfers.push(transfer);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.transfers.is_empty()
    }
}

/// Storage and value-transfer backend
#[async_trait]
pub trait EscrowBackend: Send + Sync + 'static {
    /// Short name for logs and health output
    fn name(&self) -> &'static str;

    /// Raw value stored under `key`
    async fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>>;

    /// Balance of `account` in `asset`; zero for unknown accounts
    async fn balance(&self, account: &AccountId, asset: Asset) -> Result<Amount>;

    /// Credit `account` from outside the escrow (genesis funding)
    ///
    /// Applies at most once per account and asset over the life of the
    /// store. Returns the new balance, or `None` if genesis for that pair
    /// was already applied.
    async fn mint_genesis(
        &self,
        account: &AccountId,
        asset: Asset,
        amount: Amount,
    ) -> Result<Option<Amount>>;

    /// Journal entries touching `account`, newest first
    async fn entries(&self, account: &AccountId, limit: usize) -> Result<Vec<LedgerEntry>>;

    /// Apply a staged commit atomically
    ///
    /// On error nothing in the commit has been applied.
    async fn commit(&self, commit: StagedCommit) -> Result<()>;
}
