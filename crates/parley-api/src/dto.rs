//! Request and response bodies

use chrono::{DateTime, Utc};
use parley_escrow::{EscrowEvent, LedgerEntry};
use parley_types::{AccountId, Amount, EscrowRecord};
use serde::{Deserialize, Serialize};

/// Body naming a conversation
///
/// A missing field reads as the empty id so `start_conversation` can report
/// `MISSING_IDENTIFIER` instead of a body error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    #[serde(default)]
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
}

/// Stored view of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationView {
    pub receiver_id: AccountId,
    pub amount: Amount,
}

impl From<EscrowRecord> for ConversationView {
    fn from(record: EscrowRecord) -> Self {
        Self {
            receiver_id: record.receiver_id,
            amount: record.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub account: AccountId,
    pub native: Amount,
    pub token: Amount,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesQuery {
    pub limit: Option<usize>,
}

/// Journal entries of one account, newest first
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub account: AccountId,
    pub entries: Vec<LedgerEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EscrowEvent>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub uptime_seconds: i64,
    pub timestamp: DateTime<Utc>,
}
