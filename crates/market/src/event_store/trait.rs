use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use adboard_core::{ExpectedVersion, StreamId};
use std::sync::Arc;

/// A decided event on its way to the log, before the store has assigned it
/// a sequence number.
///
/// The dispatcher builds these with [`UncommittedEvent::from_typed`], which
/// serializes the domain event to JSON and captures the metadata
/// (`event_type`, schema version, `occurred_at`) the payload needs to be
/// deserialized again during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub stream: StreamId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// An event the store has committed.
///
/// The sequence number is assigned at append time, is scoped to the stream
/// (each listing, user, and transaction counts from 1), and never changes
/// afterwards. Everything downstream leans on it: replay ordering, the
/// optimistic concurrency check, and projection cursor deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub stream: StreamId,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for projection delivery.
    pub fn to_envelope(&self) -> adboard_events::EventEnvelope<JsonValue> {
        adboard_events::EventEnvelope::new(
            self.event_id,
            self.stream,
            self.sequence_number,
            self.event_type.clone(),
            self.payload.clone(),
        )
    }
}

/// Storage-level failure: a stale append, a mixed batch, or a payload that
/// would not serialize. Business-rule failures never reach this type.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("stream version check failed: {0}")]
    Concurrency(String),

    #[error("stream integrity violation: {0}")]
    StreamMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// The marketplace's persistence boundary: append-only streams of events,
/// one stream per aggregate instance, keyed by [`StreamId`].
///
/// Events are never modified or deleted once appended. Writers coordinate
/// through [`ExpectedVersion`] rather than locks, so the trait stays
/// implementable by anything from the in-memory store the tests use to a
/// durable backend later.
pub trait EventStore: Send + Sync {
    /// Append a batch of events to a single stream, all or nothing.
    ///
    /// Implementations reject batches that mix streams, refuse the append
    /// when the stream's current version differs from `expected_version`,
    /// and number the new events consecutively from `current_version + 1`.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full history of one aggregate instance in sequence order.
    /// A stream with no events yet loads as an empty vector.
    fn load_stream(&self, stream: StreamId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Current version of a stream (0 for a stream with no events).
    fn stream_version(&self, stream: StreamId) -> Result<u64, EventStoreError> {
        let events = self.load_stream(stream)?;
        Ok(events.last().map(|e| e.sequence_number).unwrap_or(0))
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, stream: StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infrastructure decoupled from the domain modules while still
    /// capturing the event metadata needed for future deserialization.
    pub fn from_typed<E>(
        stream: StreamId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: adboard_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            stream,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
