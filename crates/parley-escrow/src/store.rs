//! Record Store
//!
//! Maps a conversation id to its escrow record on top of a backend keyspace.
//! Records are stored as `{"receiver_id":"alice","amount":"200000000"}`; the
//! key carries the conversation id.

use std::sync::Arc;

use parley_types::{AccountId, Amount, ConversationId, EscrowRecord, ParleyError, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{EscrowBackend, Keyspace, StoreOp};

/// On-disk layout of a record
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    receiver_id: AccountId,
    amount: Amount,
}

/// A record together with the exact bytes it was read from
///
/// The bytes guard the delete that consumes the record: if anything replaced
/// the value in between, the delete fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub record: EscrowRecord,
    raw: Vec<u8>,
}

/// Conversation records over an [`EscrowBackend`]
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn EscrowBackend>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn EscrowBackend>) -> Self {
        Self { backend }
    }

    /// Load a record, or `None` if the id holds nothing
    pub async fn get(&self, conversation_id: &ConversationId) -> Result<Option<EscrowRecord>> {
        Ok(self.load(conversation_id).await?.map(|s| s.record))
    }

    /// Load a record along with its stored bytes
    pub async fn load(&self, conversation_id: &ConversationId) -> Result<Option<StoredSnapshot>> {
        let Some(raw) = self
            .backend
            .get(Keyspace::Conversations, conversation_id.as_str())
            .await?
        else {
            return Ok(None);
        };

        let stored: StoredRecord = serde_json::from_slice(&raw).map_err(|e| {
            ParleyError::serialization(format!("record {conversation_id}: {e}"))
        })?;

        Ok(Some(StoredSnapshot {
            record: EscrowRecord::new(conversation_id.clone(), stored.receiver_id, stored.amount),
            raw,
        }))
    }

    /// Whether a record exists under `conversation_id`
    pub async fn contains(&self, conversation_id: &ConversationId) -> Result<bool> {
        Ok(self
            .backend
            .get(Keyspace::Conversations, conversation_id.as_str())
            .await?
            .is_some())
    }

    /// Create-once op for a new record
    pub fn stage_create(record: &EscrowRecord) -> Result<StoreOp> {
        let stored = StoredRecord {
            receiver_id: record.receiver_id.clone(),
            amount: record.amount,
        };
        Ok(StoreOp::Create {
            keyspace: Keyspace::Conversations,
            key: record.conversation_id.as_str().to_string(),
            value: serde_json::to_vec(&stored)?,
        })
    }

    /// Guarded delete of a previously loaded record
    pub fn stage_delete(snapshot: &StoredSnapshot) -> StoreOp {
        StoreOp::Delete {
            keyspace: Keyspace::Conversations,
            key: snapshot.record.conversation_id.as_str().to_string(),
            expected: snapshot.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StagedCommit;
    use crate::MemoryBackend;

    fn store() -> (Arc<MemoryBackend>, RecordStore) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), RecordStore::new(backend))
    }

    #[tokio::test]
    async fn test_stored_layout() {
        let record = EscrowRecord::new("c1".into(), "alice".into(), Amount(200_000_000));
        let op = RecordStore::stage_create(&record).unwrap();
        let StoreOp::Create { key, value, .. } = op else {
            panic!("expected create");
        };
        assert_eq!(key, "c1");
        assert_eq!(
            String::from_utf8(value).unwrap(),
            r#"{"receiver_id":"alice","amount":"200000000"}"#
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_, store) = store();
        assert_eq!(store.get(&"nope".into()).await.unwrap(), None);
        assert!(!store.contains(&"nope".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let (backend, store) = store();
        let record = EscrowRecord::new("c1".into(), "alice".into(), Amount(7));
        backend
            .commit(StagedCommit::new().op(RecordStore::stage_create(&record).unwrap()))
            .await
            .unwrap();

        let snapshot = store.load(&"c1".into()).await.unwrap().unwrap();
        assert_eq!(snapshot.record, record);

        backend
            .commit(StagedCommit::new().op(RecordStore::stage_delete(&snapshot)))
            .await
            .unwrap();
        assert_eq!(store.get(&"c1".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_large_amount_survives_storage() {
        let (backend, store) = store();
        let record = EscrowRecord::new("big".into(), "alice".into(), Amount(u128::MAX));
        backend
            .commit(StagedCommit::new().op(RecordStore::stage_create(&record).unwrap()))
            .await
            .unwrap();
        assert_eq!(store.get(&"big".into()).await.unwrap().unwrap().amount, Amount(u128::MAX));
    }

    #[tokio::test]
    async fn test_undecodable_record_is_serialization_error() {
        let (backend, store) = store();
        backend
            .commit(StagedCommit::new().op(StoreOp::Create {
                keyspace: Keyspace::Conversations,
                key: "c1".to_string(),
                value: br#"{"receiver_id":"alice","amount":200}"#.to_vec(),
            }))
            .await
            .unwrap();

        assert!(matches!(
            store.get(&"c1".into()).await,
            Err(ParleyError::Serialization { .. })
        ));
    }
}
