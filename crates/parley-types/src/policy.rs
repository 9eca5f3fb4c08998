//! Escrow policy
//!
//! The amounts the escrow works with are configuration, injected at start-up.
//! The defaults are the reference deployment's values.

use serde::{Deserialize, Serialize};

use crate::Amount;

/// Tokens escrowed per conversation
pub const DEFAULT_ESCROW_AMOUNT: Amount = Amount::new(200_000_000);

/// Native deposit accepted by the purchase gate
pub const DEFAULT_PURCHASE_PRICE: Amount = Amount::new(500_000_000_000_000_000_000_000);

/// Tokens handed out per purchase
pub const DEFAULT_PURCHASE_QUANTITY: Amount = Amount::new(3_000_000);

/// Amounts governing the escrow and purchase operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPolicy {
    /// Tokens moved into custody by every `open`
    #[serde(default = "default_escrow_amount")]
    pub escrow_amount: Amount,
    /// Exact native deposit `buy` accepts
    #[serde(default = "default_purchase_price")]
    pub purchase_price: Amount,
    /// Tokens `buy` transfers to the caller
    #[serde(default = "default_purchase_quantity")]
    pub purchase_quantity: Amount,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            escrow_amount: DEFAULT_ESCROW_AMOUNT,
            purchase_price: DEFAULT_PURCHASE_PRICE,
            purchase_quantity: DEFAULT_PURCHASE_QUANTITY,
        }
    }
}

fn default_escrow_amount() -> Amount {
    DEFAULT_ESCROW_AMOUNT
}

fn default_purchase_price() -> Amount {
    DEFAULT_PURCHASE_PRICE
}

fn default_purchase_quantity() -> Amount {
    DEFAULT_PURCHASE_QUANTITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_policy_uses_defaults() {
        let policy: EscrowPolicy = serde_json::from_str(r#"{"escrow_amount":"5"}"#).unwrap();
        assert_eq!(policy.escrow_amount, Amount(5));
        assert_eq!(policy.purchase_price, DEFAULT_PURCHASE_PRICE);
        assert_eq!(policy.purchase_quantity, DEFAULT_PURCHASE_QUANTITY);
    }
}
