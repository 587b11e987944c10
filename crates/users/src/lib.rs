//! Users domain module (marketplace members, event-sourced).
//!
//! This crate contains business rules for user registry entries, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod user;

pub use user::{
    ChangeContact, DeregisterUser, RecordTradeOutcome, RegisterUser, Relocate, RenameUser,
    TradeSide, User, UserCommand, UserContactChanged, UserDeregistered, UserEvent,
    UserRegistered, UserRelocated, UserRenamed, UserStatus, UserTradeRecorded,
};
