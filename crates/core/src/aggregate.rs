//! Aggregate contracts for the event-sourced marketplace.

use crate::error::{DomainError, DomainResult};

/// Identity and versioning shared by every aggregate.
///
/// Kept deliberately small: listings, users, and transactions each decide how
/// they model their own state transitions, and nothing infrastructural leaks
/// in here.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far (the stream revision).
    ///
    /// Never decreases; drives the optimistic concurrency check on append.
    fn version(&self) -> u64;
}

/// What version a stream must be at for a write to go through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No check: append regardless of the current version.
    Any,
    /// The stream must be exactly at this version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stream version check failed (expected {self:?}, stream at {actual})"
            )))
        }
    }
}

/// Decide/evolve split for an event-sourced aggregate.
///
/// `handle` looks at current state and a command and returns the events that
/// should happen; it must not mutate. `apply` folds one event into state and
/// is the only place state changes. Both are pure: no IO, no clocks, no
/// randomness, so replaying the same history always lands on the same state.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one event into state, bumping `version()` by one.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events follow from `command` given current state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
