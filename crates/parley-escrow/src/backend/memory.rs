//! In-memory backend
//!
//! Keyspaces and the set of seeded genesis pairs live in hash maps behind
//! one mutex; balances and the journal live in a [`Ledger`]. Nothing survives
//! a restart.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parley_ledger::{Ledger, LedgerEntry};
use parley_types::{AccountId, Amount, Asset, Result};
use tokio::sync::Mutex;

use super::{EscrowBackend, Keyspace, StagedCommit, StoreOp};

#[derive(Debug, Default)]
struct Keyspaces {
    conversations: HashMap<String, Vec<u8>>,
    refund_receipts: HashMap<String, Vec<u8>>,
    genesis: HashSet<(AccountId, Asset)>,
}

impl Keyspaces {
    fn space(&self, keyspace: Keyspace) -> &HashMap<String, Vec<u8>> {
        match keyspace {
            Keyspace::Conversations => &self.conversations,
            Keyspace::RefundReceipts => &self.refund_receipts,
        }
    }

    fn space_mut(&mut self, keyspace: Keyspace) -> &mut HashMap<String, Vec<u8>> {
        match keyspace {
            Keyspace::Conversations => &mut self.conversations,
            Keyspace::RefundReceipts => &mut self.refund_receipts,
        }
    }
}

/// Volatile backend for tests and local runs
pub struct MemoryBackend {
    keyspaces: Mutex<Keyspaces>,
    ledger: Ledger,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            keyspaces: Mutex::new(Keyspaces::default()),
            ledger: Ledger::new(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscrowBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        let keyspaces = self.keyspaces.lock().await;
        Ok(keyspaces.space(keyspace).get(key).cloned())
    }

    async fn balance(&self, account: &AccountId, asset: Asset) -> Result<Amount> {
        Ok(self.ledger.balance(account, asset).await)
    }

    async fn mint_genesis(
        &self,
        account: &AccountId,
        asset: Asset,
        amount: Amount,
    ) -> Result<Option<Amount>> {
        let mut keyspaces = self.keyspaces.lock().await;
        let slot = (account.clone(), asset);
        if keyspaces.genesis.contains(&slot) {
            return Ok(None);
        }
        let entry = self.ledger.mint(account, asset, amount).await?;
        keyspaces.genesis.insert(slot);
        Ok(Some(entry.balance_after))
    }

    async fn entries(&self, account: &AccountId, limit: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.entries(account, limit).await)
    }

    async fn commit(&self, commit: StagedCommit) -> Result<()> {
        let mut keyspaces = self.keyspaces.lock().await;

        // Guards are checked against the view the commit itself produces, so
        // two ops on the same key inside one commit see each other.
        let mut overlay: HashMap<(Keyspace, &str), Option<&[u8]>> = HashMap::new();
        for op in &commit.ops {
            let slot = (op.keyspace(), op.key());
            let current = match overlay.get(&slot) {
                Some(value) => *value,
                None => keyspaces
                    .space(op.keyspace())
                    .get(op.key())
                    .map(Vec::as_slice),
            };
            op.check(current)?;
            let next = match op {
                StoreOp::Create { value, .. } => Some(value.as_slice()),
                StoreOp::Delete { .. } => None,
            };
            overlay.insert(slot, next);
        }
        drop(overlay);

        // Balances are the only fallible step left; the ledger applies the
        // batch all-or-nothing.
        if !commit.transfers.is_empty() {
            self.ledger.apply_batch(&commit.transfers).await?;
        }

        for op in commit.ops {
            match op {
                StoreOp::Create {
                    keyspace,
                    key,
                    value,
                } => {
                    keyspaces.space_mut(keyspace).insert(key, value);
                }
                StoreOp::Delete { keyspace, key, .. } => {
                    keyspaces.space_mut(keyspace).remove(&key);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_ledger::{EntryReason, Transfer};
    use parley_types::ParleyError;

    fn create(key: &str) -> StoreOp {
        StoreOp::Create {
            keyspace: Keyspace::Conversations,
            key: key.to_string(),
            value: key.as_bytes().to_vec(),
        }
    }

    fn lock(amount: u128) -> Transfer {
        Transfer::new(
            "alice".into(),
            "escrow".into(),
            Asset::Token,
            Amount(amount),
            EntryReason::EscrowLock {
                conversation_id: "c1".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_commit_applies_ops_and_transfers() {
        let backend = MemoryBackend::new();
        backend.mint_genesis(&"alice".into(), Asset::Token, Amount(10)).await.unwrap();

        backend
            .commit(StagedCommit::new().op(create("c1")).transfer(lock(10)))
            .await
            .unwrap();

        assert_eq!(
            backend.get(Keyspace::Conversations, "c1").await.unwrap(),
            Some(b"c1".to_vec())
        );
        assert_eq!(
            backend.balance(&"escrow".into(), Asset::Token).await.unwrap(),
            Amount(10)
        );
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_no_record() {
        let backend = MemoryBackend::new();
        backend.mint_genesis(&"alice".into(), Asset::Token, Amount(5)).await.unwrap();

        let result = backend
            .commit(StagedCommit::new().op(create("c1")).transfer(lock(10)))
            .await;

        assert!(matches!(result, Err(ParleyError::InsufficientBalance { .. })));
        assert_eq!(backend.get(Keyspace::Conversations, "c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_guard_leaves_balances() {
        let backend = MemoryBackend::new();
        backend.mint_genesis(&"alice".into(), Asset::Token, Amount(20)).await.unwrap();
        backend.commit(StagedCommit::new().op(create("c1"))).await.unwrap();

        let result = backend
            .commit(StagedCommit::new().op(create("c1")).transfer(lock(10)))
            .await;

        assert!(matches!(result, Err(ParleyError::DuplicateRecord { .. })));
        assert_eq!(
            backend.balance(&"alice".into(), Asset::Token).await.unwrap(),
            Amount(20)
        );
    }

    #[tokio::test]
    async fn test_ops_in_one_commit_see_each_other() {
        let backend = MemoryBackend::new();
        let result = backend
            .commit(StagedCommit::new().op(create("c1")).op(create("c1")))
            .await;
        assert!(matches!(result, Err(ParleyError::DuplicateRecord { .. })));
        assert_eq!(backend.get(Keyspace::Conversations, "c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_genesis_applies_once_even_after_drain() {
        let backend = MemoryBackend::new();
        let alice = AccountId::from("alice");
        assert_eq!(
            backend.mint_genesis(&alice, Asset::Token, Amount(10)).await.unwrap(),
            Some(Amount(10))
        );
        backend.commit(StagedCommit::new().transfer(lock(10))).await.unwrap();

        assert_eq!(
            backend.mint_genesis(&alice, Asset::Token, Amount(10)).await.unwrap(),
            None
        );
        assert_eq!(backend.balance(&alice, Asset::Token).await.unwrap(), Amount::zero());
        assert_eq!(
            backend.mint_genesis(&alice, Asset::Native, Amount(3)).await.unwrap(),
            Some(Amount(3))
        );
    }

    #[tokio::test]
    async fn test_commit_is_journaled() {
        let backend = MemoryBackend::new();
        backend.mint_genesis(&"alice".into(), Asset::Token, Amount(10)).await.unwrap();
        backend.commit(StagedCommit::new().transfer(lock(4))).await.unwrap();

        let entries = backend.entries(&"alice".into(), 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].balance_after, Amount(6));
        assert_eq!(entries[1].reason, EntryReason::Genesis);
    }
}
