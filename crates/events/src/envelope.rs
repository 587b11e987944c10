use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adboard_core::StreamId;

/// An event together with its stream coordinates.
///
/// Envelopes are what the store hands to projections after a commit: the
/// payload plus everything needed to route it (stream, stream kind) and to
/// order/deduplicate it (`sequence_number`, strictly increasing per stream).
/// Generic over the payload so infrastructure can carry `serde_json::Value`
/// while tests work with typed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    stream: StreamId,
    stream_kind: String,

    /// Monotonically increasing position in the aggregate stream.
    sequence_number: u64,

    event_type: String,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream: StreamId,
        sequence_number: u64,
        event_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream,
            stream_kind: stream.kind().to_string(),
            sequence_number,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn stream_kind(&self) -> &str {
        &self.stream_kind
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
