//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a user (actor identity).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of a recorded transaction.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(TransactionId, "TransactionId");

/// Identifier of a listing.
///
/// Listing ids are drawn from a process-wide monotonic counter: every id is
/// unique across all listings ever created in this process and is never
/// reused. The counter starts at 1.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ListingId(u64);

static NEXT_LISTING_ID: AtomicU64 = AtomicU64::new(1);

impl ListingId {
    /// Draw the next id from the process-wide counter.
    pub fn next() -> Self {
        Self(NEXT_LISTING_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Raise the counter so that future ids are at least `floor`.
    ///
    /// Used when restoring listings from snapshots: the counter must never
    /// re-issue an id that is already live.
    pub fn claim_at_least(floor: u64) {
        NEXT_LISTING_ID.fetch_max(floor, Ordering::SeqCst);
    }
}

impl From<u64> for ListingId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ListingId> for u64 {
    fn from(value: ListingId) -> Self {
        value.0
    }
}

impl core::fmt::Display for ListingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ListingId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<u64>()
            .map_err(|e| DomainError::invalid_id(format!("ListingId: {e}")))?;
        Ok(Self(value))
    }
}

/// Key of an event stream: one stream per aggregate instance.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StreamId {
    Listing(ListingId),
    User(UserId),
    Transaction(TransactionId),
}

impl StreamId {
    /// Stable discriminator for the kind of aggregate behind this stream.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamId::Listing(_) => "listings.listing",
            StreamId::User(_) => "users.user",
            StreamId::Transaction(_) => "transactions.transaction",
        }
    }
}

impl core::fmt::Display for StreamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StreamId::Listing(id) => write!(f, "listing-{id}"),
            StreamId::User(id) => write!(f, "user-{id}"),
            StreamId::Transaction(id) => write!(f, "transaction-{id}"),
        }
    }
}
