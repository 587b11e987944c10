//! Transactions domain module (concluded trades, event-sourced).
//!
//! A transaction is minted exactly once per accepted proposal and is
//! immutable afterwards. It binds the listing, the accepted amount, and
//! both parties by `UserId` handle.
//!
//! Everything here is deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod transaction;

pub use transaction::{
    RecordTransaction, Transaction, TransactionCommand, TransactionEvent, TransactionRecorded,
};
