//! Error taxonomy shared by every aggregate.

use thiserror::Error;

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// A deterministic business-rule failure.
///
/// Only rule failures live here: bad input, a broken invariant, a stale or
/// duplicate write, a missing aggregate. Storage and delivery failures are
/// infrastructure errors and are modelled in the market crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed a validation rule (empty title, negative asking price, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// State refused the command: an invariant would no longer hold.
    #[error("invariant broken: {0}")]
    InvariantViolation(String),

    /// An identifier could not be parsed.
    #[error("malformed id: {0}")]
    InvalidId(String),

    /// The aggregate does not exist (stream has no history).
    #[error("not found")]
    NotFound,

    /// The command collides with what already happened (duplicate creation,
    /// stale version, a reference that blocks the operation).
    #[error("conflicting state: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
