use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adboard_core::{DomainError, Money, UserId};

use crate::category::Category;
use crate::listing::{ListingKind, ListingStatus};
use crate::proposal::PendingProposal;

/// Point-in-time export of a listing, including its identifier and any
/// pending proposals (best first).
///
/// The snapshot is the interchange format for exporting a listing and
/// re-importing it elsewhere. Importing claims the embedded identifier so
/// the local id counter never hands it out again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub id: u64,
    pub kind: ListingKind,
    pub owner: UserId,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub price: Money,
    pub negotiable: bool,
    pub featured: bool,
    pub highlight_until: Option<DateTime<Utc>>,
    pub views: u64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub proposals: Vec<PendingProposal>,
}

impl ListingSnapshot {
    /// Structural checks an imported snapshot must pass before it becomes a
    /// listing again.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id == 0 {
            return Err(DomainError::validation("listing id must be positive"));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if self.price.is_negative() {
            return Err(DomainError::validation("asking price cannot be negative"));
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
