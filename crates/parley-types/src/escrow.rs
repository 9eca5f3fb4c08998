//! Escrow types for Parley
//!
//! A conversation is opened by escrowing a fixed deposit from the caller.
//! The deposit is released only by a refund message signed by the refund
//! authority; the message travels as the exact string that was signed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, ConversationId, ParleyError, Result};

/// Value currently held on behalf of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Key of the record
    pub conversation_id: ConversationId,
    /// Identity that funded the escrow and is entitled to refunds
    pub receiver_id: AccountId,
    /// Escrowed value, fixed at creation
    pub amount: Amount,
}

impl EscrowRecord {
    pub fn new(conversation_id: ConversationId, receiver_id: AccountId, amount: Amount) -> Self {
        Self {
            conversation_id,
            receiver_id,
            amount,
        }
    }
}

/// Refund instruction produced and signed by the refund authority
///
/// Field order is the canonical order: `receiver_id`, `refund_amount`,
/// `conversation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefundMessage {
    pub receiver_id: AccountId,
    pub refund_amount: Amount,
    pub conversation_id: ConversationId,
}

impl RefundMessage {
    pub fn new(
        receiver_id: impl Into<AccountId>,
        refund_amount: Amount,
        conversation_id: impl Into<ConversationId>,
    ) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            refund_amount,
            conversation_id: conversation_id.into(),
        }
    }

    /// Parse the content of an already-authenticated message.
    ///
    /// Anything short of a complete, well-formed message fails closed.
    pub fn parse(message: &str) -> Result<Self> {
        let parsed: Self =
            serde_json::from_str(message).map_err(|e| ParleyError::malformed(e.to_string()))?;

        if parsed.receiver_id.is_empty() {
            return Err(ParleyError::malformed("receiver_id is empty"));
        }
        if parsed.conversation_id.is_empty() {
            return Err(ParleyError::malformed("conversation_id is empty"));
        }

        Ok(parsed)
    }

    /// Canonical compact encoding, the exact bytes the authority signs
    pub fn canonical_json(&self) -> String {
        format!(
            "{{\"receiver_id\":{},\"refund_amount\":\"{}\",\"conversation_id\":{}}}",
            json_string(self.receiver_id.as_str()),
            self.refund_amount,
            json_string(self.conversation_id.as_str()),
        )
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Execution context of a single call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Identity making the call
    pub caller: AccountId,
    /// The escrow's own custodial identity
    pub contract: AccountId,
    /// Native value attached to the call
    pub attached_deposit: Amount,
}

impl CallContext {
    pub fn new(caller: impl Into<AccountId>, contract: impl Into<AccountId>) -> Self {
        Self {
            caller: caller.into(),
            contract: contract.into(),
            attached_deposit: Amount::zero(),
        }
    }

    pub fn with_deposit(mut self, attached_deposit: Amount) -> Self {
        self.attached_deposit = attached_deposit;
        self
    }
}

/// Outcome of an applied refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub conversation_id: ConversationId,
    pub receiver_id: AccountId,
    /// Value transferred to the receiver
    pub refund_amount: Amount,
    /// Part of the escrow kept by the custodial identity
    pub retained_amount: Amount,
    /// Hex SHA-256 digest of the signed message
    pub message_digest: String,
    pub refunded_at: DateTime<Utc>,
}

/// Outcome of a token purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub buyer: AccountId,
    /// Native value paid
    pub paid: Amount,
    /// Tokens received
    pub received: Amount,
    pub purchased_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_layout() {
        let msg = RefundMessage::new("alice", Amount(200_000_000), "c1");
        assert_eq!(
            msg.canonical_json(),
            r#"{"receiver_id":"alice","refund_amount":"200000000","conversation_id":"c1"}"#
        );
    }

    #[test]
    fn test_canonical_json_matches_serde() {
        let msg = RefundMessage::new("bob \"the\" builder", Amount(1), "c\n2");
        assert_eq!(msg.canonical_json(), serde_json::to_string(&msg).unwrap());
    }

    #[test]
    fn test_parse_round_trips_canonical_form() {
        let msg = RefundMessage::new("alice", Amount(42), "c1");
        assert_eq!(RefundMessage::parse(&msg.canonical_json()).unwrap(), msg);
    }

    #[test]
    fn test_parse_fails_closed() {
        let cases = [
            "not json",
            r#"{"receiver_id":"alice","conversation_id":"c1"}"#,
            r#"{"receiver_id":"alice","refund_amount":"1","conversation_id":"c1","extra":1}"#,
            r#"{"receiver_id":"alice","refund_amount":1,"conversation_id":"c1"}"#,
            r#"{"receiver_id":"alice","refund_amount":"-1","conversation_id":"c1"}"#,
            r#"{"receiver_id":"","refund_amount":"1","conversation_id":"c1"}"#,
            r#"{"receiver_id":"alice","refund_amount":"1","conversation_id":""}"#,
        ];
        for case in cases {
            assert!(
                matches!(RefundMessage::parse(case), Err(ParleyError::MalformedMessage { .. })),
                "accepted {case}"
            );
        }
    }
}
