//! Parley Types - Canonical domain types for escrowed conversations
//!
//! This crate contains all foundational types for Parley with zero dependencies
//! on other parley crates. It defines:
//!
//! - Identity types (AccountId, ConversationId)
//! - Amounts (`u128` smallest units, decimal strings on the wire) and assets
//! - Escrow records, refund messages and operation receipts
//! - The execution context of a call and the escrow policy
//! - The error taxonomy shared by every crate
//!
//! # Invariants
//!
//! 1. A conversation id identifies at most one live escrow record
//! 2. A record's amount is fixed at creation and only ever removed whole
//! 3. Value is released only against a refund message signed by the authority
//! 4. Amounts never truncate: malformed or out-of-range strings are rejected

pub mod identity;
pub mod amount;
pub mod escrow;
pub mod policy;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use escrow::*;
pub use policy::*;
pub use error::*;
