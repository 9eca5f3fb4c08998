//! Escrow Ledger
//!
//! Orchestrates the conversation lifecycle: `open` escrows the deposit,
//! `view` reads the record, `refund` releases value against a signature
//! from the refund authority and closes the record.
//!
//! # Security Invariant
//!
//! A refund is authenticated over the exact submitted bytes before any of
//! its fields are read. Nothing about an unauthenticated message reaches the
//! record store or the balances.

use std::sync::Arc;

use chrono::Utc;
use parley_crypto::RefundVerifier;
use parley_ledger::{EntryReason, LedgerEntry, Transfer};
use parley_types::{
    AccountId, Amount, Asset, CallContext, ConversationId, EscrowPolicy, EscrowRecord,
    ParleyError, RefundMessage, RefundReceipt, Result,
};
use tracing::{debug, info, warn};

use crate::backend::{EscrowBackend, Keyspace, StagedCommit, StoreOp};
use crate::events::{EscrowEvent, EventBus};
use crate::store::RecordStore;

/// Log target for authorization failures
pub const SECURITY_TARGET: &str = "parley::security";

/// Conversation escrow over a storage backend
#[derive(Clone)]
pub struct EscrowLedger {
    backend: Arc<dyn EscrowBackend>,
    store: RecordStore,
    verifier: RefundVerifier,
    policy: EscrowPolicy,
    events: EventBus,
}

impl EscrowLedger {
    pub fn new(
        backend: Arc<dyn EscrowBackend>,
        verifier: RefundVerifier,
        policy: EscrowPolicy,
        events: EventBus,
    ) -> Self {
        Self {
            store: RecordStore::new(backend.clone()),
            backend,
            verifier,
            policy,
            events,
        }
    }

    pub fn policy(&self) -> &EscrowPolicy {
        &self.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn backend(&self) -> &Arc<dyn EscrowBackend> {
        &self.backend
    }

    /// Open a conversation, escrowing the policy amount from the caller.
    ///
    /// Fails with `MissingIdentifier` for an empty id and `DuplicateRecord`
    /// if the id is taken. On failure no record exists and no value moved.
    pub async fn open(&self, ctx: &CallContext, conversation_id: &str) -> Result<ConversationId> {
        let conversation_id = ConversationId::parse(conversation_id)?;

        if self.store.contains(&conversation_id).await? {
            return Err(ParleyError::DuplicateRecord { conversation_id });
        }

        let record = EscrowRecord::new(
            conversation_id.clone(),
            ctx.caller.clone(),
            self.policy.escrow_amount,
        );

        let mut commit = StagedCommit::new().op(RecordStore::stage_create(&record)?);
        if !record.amount.is_zero() {
            commit = commit.transfer(Transfer::new(
                ctx.caller.clone(),
                ctx.contract.clone(),
                Asset::Token,
                record.amount,
                EntryReason::EscrowLock {
                    conversation_id: conversation_id.clone(),
                },
            ));
        }

        self.backend.commit(commit).await?;

        info!(
            %conversation_id,
            receiver_id = %record.receiver_id,
            amount = %record.amount,
            "conversation opened"
        );
        self.events
            .emit(EscrowEvent::ConversationOpened {
                conversation_id: conversation_id.clone(),
                receiver_id: record.receiver_id,
                amount: record.amount,
                timestamp: Utc::now(),
            })
            .await;

        Ok(conversation_id)
    }

    /// Read a record. Absent ids, including the empty id, yield `None`.
    pub async fn view(&self, conversation_id: &str) -> Result<Option<EscrowRecord>> {
        if conversation_id.is_empty() {
            return Ok(None);
        }
        let record = self.store.get(&conversation_id.into()).await?;
        debug!(conversation_id, found = record.is_some(), "conversation viewed");
        Ok(record)
    }

    /// Apply a signed refund.
    ///
    /// `refund_message` must be the exact string the authority signed.
    /// `refund_amount` goes to the receiver; whatever else the record held
    /// stays with the custodial account. The record is closed either way.
    pub async fn refund(
        &self,
        ctx: &CallContext,
        refund_message: &str,
        signature: &[u8],
    ) -> Result<RefundReceipt> {
        let digest = match self.verifier.authenticate(refund_message, signature) {
            Ok(digest) => digest,
            Err(e) => {
                let err = ParleyError::from(e);
                warn!(
                    target: SECURITY_TARGET,
                    caller = %ctx.caller,
                    error = %err,
                    "refund signature rejected"
                );
                self.reject(None, &err).await;
                return Err(err);
            }
        };
        let message_digest = hex::encode(digest);

        let message = match RefundMessage::parse(refund_message) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    target: SECURITY_TARGET,
                    digest = %message_digest,
                    error = %err,
                    "signed refund message is malformed"
                );
                self.reject(None, &err).await;
                return Err(err);
            }
        };

        match self.apply_refund(ctx, &message, &message_digest).await {
            Ok(receipt) => {
                info!(
                    conversation_id = %receipt.conversation_id,
                    receiver_id = %receipt.receiver_id,
                    refund_amount = %receipt.refund_amount,
                    retained_amount = %receipt.retained_amount,
                    "refund issued"
                );
                self.events
                    .emit(EscrowEvent::RefundIssued {
                        conversation_id: receipt.conversation_id.clone(),
                        receiver_id: receipt.receiver_id.clone(),
                        refund_amount: receipt.refund_amount,
                        retained_amount: receipt.retained_amount,
                        timestamp: receipt.refunded_at,
                    })
                    .await;
                Ok(receipt)
            }
            Err(err) => {
                warn!(
                    conversation_id = %message.conversation_id,
                    digest = %message_digest,
                    error = %err,
                    "refund not applied"
                );
                self.reject(Some(message.conversation_id.clone()), &err).await;
                Err(err)
            }
        }
    }

    async fn apply_refund(
        &self,
        ctx: &CallContext,
        message: &RefundMessage,
        message_digest: &str,
    ) -> Result<RefundReceipt> {
        if self
            .backend
            .get(Keyspace::RefundReceipts, message_digest)
            .await?
            .is_some()
        {
            return Err(ParleyError::RefundAlreadyApplied {
                digest: message_digest.to_string(),
            });
        }

        let snapshot = self
            .store
            .load(&message.conversation_id)
            .await?
            .ok_or_else(|| ParleyError::RecordNotFound {
                conversation_id: message.conversation_id.clone(),
            })?;
        let record = &snapshot.record;

        let retained_amount = record.amount.checked_sub(message.refund_amount).ok_or_else(|| {
            ParleyError::InsufficientEscrow {
                conversation_id: record.conversation_id.clone(),
                escrowed: record.amount,
                requested: message.refund_amount,
            }
        })?;

        let receipt = RefundReceipt {
            conversation_id: record.conversation_id.clone(),
            receiver_id: message.receiver_id.clone(),
            refund_amount: message.refund_amount,
            retained_amount,
            message_digest: message_digest.to_string(),
            refunded_at: Utc::now(),
        };

        let mut commit = StagedCommit::new()
            .op(RecordStore::stage_delete(&snapshot))
            .op(StoreOp::Create {
                keyspace: Keyspace::RefundReceipts,
                key: message_digest.to_string(),
                value: serde_json::to_vec(&receipt)?,
            });
        if !message.refund_amount.is_zero() {
            commit = commit.transfer(Transfer::new(
                ctx.contract.clone(),
                message.receiver_id.clone(),
                Asset::Token,
                message.refund_amount,
                EntryReason::EscrowRefund {
                    conversation_id: record.conversation_id.clone(),
                },
            ));
        }

        self.backend.commit(commit).await?;
        Ok(receipt)
    }

    async fn reject(&self, conversation_id: Option<ConversationId>, err: &ParleyError) {
        self.events
            .emit(EscrowEvent::RefundRejected {
                conversation_id,
                code: err.error_code().to_string(),
                reason: err.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Balance passthrough for callers that only hold the ledger
    pub async fn balance(&self, account: &AccountId, asset: Asset) -> Result<Amount> {
        self.backend.balance(account, asset).await
    }

    /// Journal entries touching `account`, newest first
    pub async fn entries(&self, account: &AccountId, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.backend.entries(account, limit).await
    }
}
