//! Parley Escrow - Escrowed conversations with signed refunds
//!
//! Opening a conversation moves a fixed token deposit from the caller into
//! the custody of the escrow's own account. The deposit comes back out only
//! against a refund message signed by the refund authority.
//!
//! Every mutating operation is expressed as one [`StagedCommit`]: the record
//! store operations and ledger transfers it wants, handed to the backend as a
//! unit. Backends apply a commit completely or not at all.

pub mod backend;
pub mod events;
pub mod ledger;
pub mod purchase;
pub mod store;

pub use backend::memory::MemoryBackend;
pub use backend::persistent::SledBackend;
pub use backend::{EscrowBackend, Keyspace, StagedCommit, StoreOp};
pub use events::{EscrowEvent, EventBus};
pub use ledger::EscrowLedger;
pub use purchase::PurchaseGate;
pub use store::{RecordStore, StoredSnapshot};

pub use parley_ledger::{EntryReason, EntryType, LedgerEntry};
