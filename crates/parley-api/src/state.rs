//! Application state shared across handlers

use chrono::{DateTime, Utc};
use parley_escrow::{EscrowLedger, EventBus, PurchaseGate};
use parley_types::AccountId;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Conversation escrow
    pub ledger: EscrowLedger,
    /// Token purchase gate
    pub gate: PurchaseGate,
    /// Custodial identity used as `contract` in every call context
    pub contract: AccountId,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(ledger: EscrowLedger, gate: PurchaseGate, contract: AccountId) -> Self {
        Self {
            ledger,
            gate,
            contract,
            started_at: Utc::now(),
        }
    }

    pub fn events(&self) -> &EventBus {
        self.ledger.events()
    }
}
