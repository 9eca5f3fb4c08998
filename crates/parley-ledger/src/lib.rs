//! Parley Ledger - Value-transfer ledger for escrowed conversations
//!
//! The ledger is:
//! - Asset-scoped (native currency and ledger tokens)
//! - Account-keyed by AccountId
//! - Append-only (every balance change is journaled)
//! - Batch-atomic (a batch of transfers applies completely or not at all)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. A failed batch leaves balances and journal untouched

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_types::{AccountId, Amount, Asset, ConversationId, ParleyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {account}")]
    AccountNotFound { account: AccountId },

    #[error("Insufficient {asset} balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: AccountId,
        asset: Asset,
        available: Amount,
        required: Amount,
    },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Balance overflow for {account}")]
    Overflow { account: AccountId },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<LedgerError> for ParleyError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound { account } => ParleyError::AccountNotFound { account },
            LedgerError::InsufficientBalance {
                account,
                asset,
                available,
                required,
            } => ParleyError::InsufficientBalance {
                account,
                asset,
                available,
                required,
            },
            LedgerError::InvalidAmount { message } => ParleyError::invalid_amount("", message),
            LedgerError::Overflow { .. } => ParleyError::AmountOverflow,
        }
    }
}

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryReason {
    /// Balance seeded at start-up
    Genesis,
    /// Deposit moved into custody when a conversation opens
    EscrowLock { conversation_id: ConversationId },
    /// Escrowed value released to the receiver
    EscrowRefund { conversation_id: ConversationId },
    /// Native deposit paid to the purchase gate
    PurchasePayment,
    /// Tokens handed out by the purchase gate
    PurchaseDelivery,
}

/// One movement of value between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: AccountId,
    pub to: AccountId,
    pub asset: Asset,
    pub amount: Amount,
    pub reason: EntryReason,
}

impl Transfer {
    pub fn new(
        from: AccountId,
        to: AccountId,
        asset: Asset,
        amount: Amount,
        reason: EntryReason,
    ) -> Self {
        Self {
            from,
            to,
            asset,
            amount,
            reason,
        }
    }
}

/// A single ledger entry (one side of a transfer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: AccountId,
    pub asset: Asset,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        account: AccountId,
        asset: Asset,
        entry_type: EntryType,
        amount: Amount,
        balance_after: Amount,
        reason: EntryReason,
    ) -> Self {
        Self {
            entry_id: EntryId::new(),
            account,
            asset,
            entry_type,
            amount,
            balance_after,
            reason,
            created_at: Utc::now(),
        }
    }

    /// Credit seeded from outside the ledger
    pub fn genesis(account: AccountId, asset: Asset, amount: Amount, balance_after: Amount) -> Self {
        Self::new(
            account,
            asset,
            EntryType::Credit,
            amount,
            balance_after,
            EntryReason::Genesis,
        )
    }
}

/// Pure balance arithmetic for a batch of transfers.
///
/// Works on a scratch copy of the touched balances so a failure part-way
/// through leaves the caller's state untouched. Shared by every backend that
/// keeps balances.
#[derive(Debug, Default)]
pub struct BatchPlan {
    balances: HashMap<(AccountId, Asset), Amount>,
    entries: Vec<LedgerEntry>,
}

impl BatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transfer against the scratch balances.
    ///
    /// `load` supplies the committed balance of an account the plan has not
    /// touched yet, or `None` if the account has never held the asset.
    pub fn apply<F>(&mut self, transfer: &Transfer, mut load: F) -> Result<()>
    where
        F: FnMut(&AccountId, Asset) -> Option<Amount>,
    {
        if transfer.amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }

        let from_key = (transfer.from.clone(), transfer.asset);
        let available = match self.balances.get(&from_key) {
            Some(balance) => *balance,
            None => load(&transfer.from, transfer.asset).ok_or_else(|| {
                LedgerError::AccountNotFound {
                    account: transfer.from.clone(),
                }
            })?,
        };
        let debited =
            available
                .checked_sub(transfer.amount)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    account: transfer.from.clone(),
                    asset: transfer.asset,
                    available,
                    required: transfer.amount,
                })?;
        self.balances.insert(from_key, debited);

        let to_key = (transfer.to.clone(), transfer.asset);
        let current = match self.balances.get(&to_key) {
            Some(balance) => *balance,
            None => load(&transfer.to, transfer.asset).unwrap_or(Amount::zero()),
        };
        let credited = current
            .checked_add(transfer.amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: transfer.to.clone(),
            })?;
        self.balances.insert(to_key, credited);

        self.entries.push(LedgerEntry::new(
            transfer.from.clone(),
            transfer.asset,
            EntryType::Debit,
            transfer.amount,
            debited,
            transfer.reason.clone(),
        ));
        self.entries.push(LedgerEntry::new(
            transfer.to.clone(),
            transfer.asset,
            EntryType::Credit,
            transfer.amount,
            credited,
            transfer.reason.clone(),
        ));
        Ok(())
    }

    /// Final balances of every account the plan touched
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, Asset, Amount)> {
        self.balances
            .iter()
            .map(|((account, asset), amount)| (account, *asset, *amount))
    }

    /// Journal entries in the order the transfers were applied
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries
    }
}

/// The Parley Ledger
///
/// In-memory value-transfer ledger. Thread-safe; every mutation takes the
/// write locks for its whole duration so batches are never interleaved.
#[derive(Clone)]
pub struct Ledger {
    /// Balance per (account, asset); absent means never held
    balances: Arc<RwLock<HashMap<(AccountId, Asset), Amount>>>,
    /// All entries (append-only)
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl Ledger {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the balance of an account for a specific asset
    pub async fn balance(&self, account: &AccountId, asset: Asset) -> Amount {
        let balances = self.balances.read().await;
        balances
            .get(&(account.clone(), asset))
            .copied()
            .unwrap_or(Amount::zero())
    }

    /// Credit an account from outside the ledger (genesis funding)
    ///
    /// Returns the journaled entry.
    pub async fn mint(
        &self,
        account: &AccountId,
        asset: Asset,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }

        let mut balances = self.balances.write().await;
        let mut entries = self.entries.write().await;

        let slot = balances.entry((account.clone(), asset)).or_default();
        let new_balance = slot
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: account.clone(),
            })?;
        *slot = new_balance;

        let entry = LedgerEntry::genesis(account.clone(), asset, amount, new_balance);
        entries.push(entry.clone());

        tracing::debug!(%account, %asset, %amount, balance = %new_balance, "ledger mint");
        Ok(entry)
    }

    /// Apply a batch of transfers atomically.
    ///
    /// Either every transfer is applied and journaled, or none is.
    pub async fn apply_batch(&self, transfers: &[Transfer]) -> Result<Vec<EntryId>> {
        let mut balances = self.balances.write().await;
        let mut entries = self.entries.write().await;

        let mut plan = BatchPlan::new();
        for transfer in transfers {
            plan.apply(transfer, |account, asset| {
                balances.get(&(account.clone(), asset)).copied()
            })?;
        }

        for (account, asset, amount) in plan.balances() {
            balances.insert((account.clone(), asset), amount);
        }
        let applied = plan.into_entries();
        let entry_ids = applied.iter().map(|e| e.entry_id.clone()).collect();
        entries.extend(applied);

        Ok(entry_ids)
    }

    /// Entries for one account, newest first
    pub async fn entries(&self, account: &AccountId, limit: usize) -> Vec<LedgerEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .filter(|e| &e.account == account)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
