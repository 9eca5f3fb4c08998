//! Durable backend on sled
//!
//! Trees: `conversations`, `refund_receipts`, `balances`, `genesis` and
//! `journal`. A commit runs as one multi-tree transaction, so a crash or an
//! error at any point leaves either all of it or none of it on disk.
//!
//! Balance keys are `"{asset}/{account}"`; values are 16-byte big-endian
//! `u128`s. The `genesis` tree marks every (account, asset) pair that has been
//! seeded, under the same key. Journal keys are big-endian ids from
//! `generate_id`, so iteration order is commit order; values are JSON
//! [`LedgerEntry`]s.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parley_ledger::{BatchPlan, LedgerEntry, Transfer};
use parley_types::{AccountId, Amount, Asset, ParleyError, Result};
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};

use super::{EscrowBackend, Keyspace, StagedCommit, StoreOp};

const BALANCES_TREE: &str = "balances";
const GENESIS_TREE: &str = "genesis";
const JOURNAL_TREE: &str = "journal";

/// Persistent backend
#[derive(Clone)]
pub struct SledBackend {
    db: Db,
    conversations: Tree,
    refund_receipts: Tree,
    balances: Tree,
    genesis: Tree,
    journal: Tree,
}

impl SledBackend {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(storage_error)?;
        Self::from_db(db)
    }

    /// Database that is removed when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_error)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let conversations = db
            .open_tree(Keyspace::Conversations.as_str())
            .map_err(storage_error)?;
        let refund_receipts = db
            .open_tree(Keyspace::RefundReceipts.as_str())
            .map_err(storage_error)?;
        let balances = db.open_tree(BALANCES_TREE).map_err(storage_error)?;
        let genesis = db.open_tree(GENESIS_TREE).map_err(storage_error)?;
        let journal = db.open_tree(JOURNAL_TREE).map_err(storage_error)?;

        tracing::info!(
            conversations = conversations.len(),
            refund_receipts = refund_receipts.len(),
            journal = journal.len(),
            "opened sled backend"
        );

        Ok(Self {
            db,
            conversations,
            refund_receipts,
            balances,
            genesis,
            journal,
        })
    }

    fn tree(&self, keyspace: Keyspace) -> &Tree {
        match keyspace {
            Keyspace::Conversations => &self.conversations,
            Keyspace::RefundReceipts => &self.refund_receipts,
        }
    }

    /// Flush dirty pages to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(storage_error)?;
        Ok(())
    }

    fn apply(&self, commit: &StagedCommit) -> Result<()> {
        let trees = (
            &self.conversations,
            &self.refund_receipts,
            &self.balances,
            &self.journal,
        );
        let result = trees.transaction(
            |(conversations, refund_receipts, balances, journal)| -> ConflictableTransactionResult<(), ParleyError> {
                let space = |keyspace: Keyspace| match keyspace {
                    Keyspace::Conversations => conversations,
                    Keyspace::RefundReceipts => refund_receipts,
                };

                // sled transactions read their own writes, so guards on the
                // same key within one commit see earlier ops.
                for op in &commit.ops {
                    let tree = space(op.keyspace());
                    let current = tree.get(op.key())?;
                    if let Err(e) = op.check(current.as_deref()) {
                        return abort(e);
                    }
                    match op {
                        StoreOp::Create { key, value, .. } => {
                            tree.insert(key.as_bytes(), value.as_slice())?;
                        }
                        StoreOp::Delete { key, .. } => {
                            tree.remove(key.as_bytes())?;
                        }
                    }
                }

                if !commit.transfers.is_empty() {
                    let committed = load_balances(balances, &commit.transfers)?;
                    let mut plan = BatchPlan::new();
                    for transfer in &commit.transfers {
                        let applied = plan.apply(transfer, |account, asset| {
                            committed.get(&(account.clone(), asset)).copied().flatten()
                        });
                        if let Err(e) = applied {
                            return abort(ParleyError::from(e));
                        }
                    }
                    for (account, asset, amount) in plan.balances() {
                        balances.insert(
                            balance_key(account, asset).as_bytes(),
                            &amount.value().to_be_bytes()[..],
                        )?;
                    }
                    for entry in plan.entries() {
                        append_entry(journal, entry)?;
                    }
                }

                Ok(())
            },
        );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => storage_error(e),
        })
    }
}

/// Committed balance of every account a batch touches; `None` marks an
/// account that has never held the asset.
fn load_balances(
    balances: &TransactionalTree,
    transfers: &[Transfer],
) -> ConflictableTransactionResult<HashMap<(AccountId, Asset), Option<Amount>>, ParleyError> {
    let mut loaded = HashMap::new();
    for transfer in transfers {
        for account in [&transfer.from, &transfer.to] {
            let slot = (account.clone(), transfer.asset);
            if loaded.contains_key(&slot) {
                continue;
            }
            let raw = balances.get(balance_key(account, transfer.asset).as_bytes())?;
            let amount = match raw {
                Some(bytes) => match decode_balance(&bytes) {
                    Ok(amount) => Some(amount),
                    Err(e) => return Err(ConflictableTransactionError::Abort(e)),
                },
                None => None,
            };
            loaded.insert(slot, amount);
        }
    }
    Ok(loaded)
}

fn append_entry(
    journal: &TransactionalTree,
    entry: &LedgerEntry,
) -> ConflictableTransactionResult<(), ParleyError> {
    let id = journal
        .generate_id()
        .map_err(ConflictableTransactionError::Storage)?;
    let value = match serde_json::to_vec(entry) {
        Ok(value) => value,
        Err(e) => return abort(ParleyError::serialization(e.to_string())),
    };
    journal.insert(&id.to_be_bytes()[..], value)?;
    Ok(())
}

fn balance_key(account: &AccountId, asset: Asset) -> String {
    format!("{}/{}", asset.as_str(), account)
}

fn decode_balance(bytes: &[u8]) -> Result<Amount> {
    let raw: [u8; 16] = bytes
        .try_into()
        .map_err(|_| ParleyError::storage(format!("corrupt balance of {} bytes", bytes.len())))?;
    Ok(Amount(u128::from_be_bytes(raw)))
}

fn storage_error(e: sled::Error) -> ParleyError {
    ParleyError::storage(e.to_string())
}

#[async_trait]
impl EscrowBackend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    async fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.tree(keyspace).get(key).map_err(storage_error)?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn balance(&self, account: &AccountId, asset: Asset) -> Result<Amount> {
        match self
            .balances
            .get(balance_key(account, asset).as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => decode_balance(&bytes),
            None => Ok(Amount::zero()),
        }
    }

    async fn mint_genesis(
        &self,
        account: &AccountId,
        asset: Asset,
        amount: Amount,
    ) -> Result<Option<Amount>> {
        if amount.is_zero() {
            return Err(ParleyError::invalid_amount("0", "mint amount must be greater than zero"));
        }
        let key = balance_key(account, asset);
        let trees = (&self.genesis, &self.balances, &self.journal);
        let result = trees.transaction(
            |(genesis, balances, journal)| -> ConflictableTransactionResult<Option<Amount>, ParleyError> {
                if genesis.get(key.as_bytes())?.is_some() {
                    return Ok(None);
                }
                let current = match balances.get(key.as_bytes())? {
                    Some(bytes) => match decode_balance(&bytes) {
                        Ok(amount) => amount,
                        Err(e) => return abort(e),
                    },
                    None => Amount::zero(),
                };
                let Some(next) = current.checked_add(amount) else {
                    return abort(ParleyError::AmountOverflow);
                };
                balances.insert(key.as_bytes(), &next.value().to_be_bytes()[..])?;
                genesis.insert(key.as_bytes(), &amount.value().to_be_bytes()[..])?;
                append_entry(
                    journal,
                    &LedgerEntry::genesis(account.clone(), asset, amount, next),
                )?;
                Ok(Some(next))
            },
        );
        let minted = result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => storage_error(e),
        })?;

        if let Some(balance) = minted {
            self.flush().await?;
            tracing::debug!(%account, %asset, %amount, %balance, "sled genesis mint");
        }
        Ok(minted)
    }

    async fn entries(&self, account: &AccountId, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut found = Vec::new();
        for item in self.journal.iter().rev() {
            if found.len() == limit {
                break;
            }
            let (_, value) = item.map_err(storage_error)?;
            let entry: LedgerEntry = serde_json::from_slice(&value)
                .map_err(|e| ParleyError::serialization(format!("corrupt journal entry: {e}")))?;
            if &entry.account == account {
                found.push(entry);
            }
        }
        Ok(found)
    }

    async fn commit(&self, commit: StagedCommit) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.apply(&commit))
            .await
            .map_err(|e| ParleyError::internal(format!("commit task failed: {e}")))??;
        self.flush().await
    }
}
