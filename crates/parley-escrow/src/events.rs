//! Escrow events for audit and streaming
//!
//! Events are broadcast to all subscribers and kept in a bounded history so
//! late readers (the HTTP events endpoint) can catch up.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_types::{AccountId, Amount, ConversationId};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Events retained for late readers
pub const DEFAULT_HISTORY: usize = 1024;

/// Something that happened to escrowed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EscrowEvent {
    /// A conversation was opened and its deposit taken into custody
    ConversationOpened {
        conversation_id: ConversationId,
        receiver_id: AccountId,
        amount: Amount,
        timestamp: DateTime<Utc>,
    },

    /// A signed refund was applied and the record closed
    RefundIssued {
        conversation_id: ConversationId,
        receiver_id: AccountId,
        refund_amount: Amount,
        retained_amount: Amount,
        timestamp: DateTime<Utc>,
    },

    /// A refund was turned away before any state changed
    RefundRejected {
        conversation_id: Option<ConversationId>,
        code: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Native deposit exchanged for tokens
    TokensPurchased {
        buyer: AccountId,
        paid: Amount,
        received: Amount,
        timestamp: DateTime<Utc>,
    },
}

impl EscrowEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ConversationOpened { timestamp, .. }
            | Self::RefundIssued { timestamp, .. }
            | Self::RefundRejected { timestamp, .. }
            | Self::TokensPurchased { timestamp, .. } => *timestamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConversationOpened { .. } => "conversation_opened",
            Self::RefundIssued { .. } => "refund_issued",
            Self::RefundRejected { .. } => "refund_rejected",
            Self::TokensPurchased { .. } => "tokens_purchased",
        }
    }
}

/// Broadcast channel plus bounded history
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EscrowEvent>,
    history: Arc<RwLock<VecDeque<EscrowEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record and broadcast an event
    pub async fn emit(&self, event: EscrowEvent) {
        {
            let mut history = self.history.write().await;
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EscrowEvent> {
        self.sender.subscribe()
    }

    /// Most recent events, newest first
    pub async fn recent(&self, limit: usize) -> Vec<EscrowEvent> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
