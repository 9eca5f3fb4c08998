//! Token Purchase Gate
//!
//! Sells a fixed quantity of tokens for an exact native deposit. The deposit
//! settles into the custodial account and the tokens come out of it, in the
//! same commit.

use std::sync::Arc;

use chrono::Utc;
use parley_ledger::{EntryReason, Transfer};
use parley_types::{Asset, CallContext, EscrowPolicy, ParleyError, PurchaseReceipt, Result};
use tracing::info;

use crate::backend::{EscrowBackend, StagedCommit};
use crate::events::{EscrowEvent, EventBus};

#[derive(Clone)]
pub struct PurchaseGate {
    backend: Arc<dyn EscrowBackend>,
    policy: EscrowPolicy,
    events: EventBus,
}

impl PurchaseGate {
    pub fn new(backend: Arc<dyn EscrowBackend>, policy: EscrowPolicy, events: EventBus) -> Self {
        Self {
            backend,
            policy,
            events,
        }
    }

    /// Exchange the attached deposit for `purchase_quantity` tokens.
    ///
    /// Any deposit other than exactly `purchase_price` is refused with
    /// `IncorrectDeposit` and nothing moves.
    pub async fn buy(&self, ctx: &CallContext) -> Result<PurchaseReceipt> {
        if ctx.attached_deposit != self.policy.purchase_price {
            return Err(ParleyError::IncorrectDeposit {
                expected: self.policy.purchase_price,
                attached: ctx.attached_deposit,
            });
        }

        let paid = ctx.attached_deposit;
        let received = self.policy.purchase_quantity;

        let mut commit = StagedCommit::new();
        if !paid.is_zero() {
            commit = commit.transfer(Transfer::new(
                ctx.caller.clone(),
                ctx.contract.clone(),
                Asset::Native,
                paid,
                EntryReason::PurchasePayment,
            ));
        }
        if !received.is_zero() {
            commit = commit.transfer(Transfer::new(
                ctx.contract.clone(),
                ctx.caller.clone(),
                Asset::Token,
                received,
                EntryReason::PurchaseDelivery,
            ));
        }
        self.backend.commit(commit).await?;

        let receipt = PurchaseReceipt {
            buyer: ctx.caller.clone(),
            paid,
            received,
            purchased_at: Utc::now(),
        };

        info!(buyer = %receipt.buyer, %paid, %received, "tokens purchased");
        self.events
            .emit(EscrowEvent::TokensPurchased {
                buyer: receipt.buyer.clone(),
                paid,
                received,
                timestamp: receipt.purchased_at,
            })
            .await;

        Ok(receipt)
    }
}
