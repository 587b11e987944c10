//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: Can be reconstructed from the event log
//! - **Idempotent**: Safe for at-least-once delivery
//! - **Selective**: Each consumes only the stream kinds it cares about and
//!   ignores the rest, so all of them can share one delivery path
//!
//! The dispatcher feeds every committed event to every registered projection
//! through the [`Projection`] trait, in commit order.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use adboard_core::StreamId;
use adboard_events::EventEnvelope;

pub mod catalog;
pub mod directory;
pub mod references;
pub mod trades;

pub use catalog::{CatalogEntry, CatalogProjection, OfferSummary};
pub use directory::{DirectoryProjection, UserCard};
pub use references::ReferenceLedgerProjection;
pub use trades::{TradeLedgerProjection, TradeRecord};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model builder fed by the dispatcher after every commit.
pub trait Projection: Send + Sync {
    /// Stable name, used in error reporting and logs.
    fn name(&self) -> &str;

    /// Apply one committed envelope into the read model.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;
}

/// Verdict of a cursor check for an incoming envelope.
pub enum CursorCheck {
    /// The sequence advances the stream; apply the event, then advance.
    Apply,
    /// Duplicate or replay; safe to ignore.
    Skip,
}

/// Per-stream sequence cursors.
///
/// Every projection tracks the last applied sequence number per stream so
/// replays and duplicates are ignored instead of double-applied.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<StreamId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    fn last(&self, stream: StreamId) -> u64 {
        match self.inner.read() {
            Ok(cursors) => *cursors.get(&stream).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    /// Check an incoming sequence number against the stream's cursor.
    pub fn check(&self, stream: StreamId, seq: u64) -> Result<CursorCheck, ProjectionError> {
        let last = self.last(stream);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(CursorCheck::Skip);
        }

        if seq != last + 1 && last != 0 {
            // The first event may carry any positive sequence (some stores
            // start above 1); after that strict increments are enforced.
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(CursorCheck::Apply)
    }

    /// Advance the cursor after a successful apply.
    pub fn advance(&self, stream: StreamId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(stream, seq);
        }
    }

    /// Forget every cursor (rebuild support).
    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
