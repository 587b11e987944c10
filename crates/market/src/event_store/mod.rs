//! Append-only event store boundary.
//!
//! The store keeps one ordered stream per aggregate and enforces optimistic
//! concurrency on append. Everything downstream (rehydration, projections,
//! exports) reads from here.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
