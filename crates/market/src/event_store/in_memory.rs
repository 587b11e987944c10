use std::collections::HashMap;
use std::sync::RwLock;

use adboard_core::{ExpectedVersion, StreamId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// The store backing the single-process marketplace: every listing, user,
/// and transaction stream lives in one `RwLock`-guarded map. Plenty for the
/// CLI and the test suite; a durable backend would slot in behind the same
/// trait.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamId, Vec<StoredEvent>>>,
}

fn poisoned() -> EventStoreError {
    EventStoreError::InvalidAppend("store lock poisoned".to_string())
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Every committed event across all streams. Read-model rebuilds replay
    /// this, sorted by the caller.
    pub fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;

        Ok(streams.values().flatten().cloned().collect())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events in a batch must target the same stream.
        let stream_id = events[0].stream;
        for (idx, e) in events.iter().enumerate() {
            if e.stream != stream_id {
                return Err(EventStoreError::StreamMismatch(format!(
                    "batch contains multiple streams (index {idx})"
                )));
            }
        }

        let mut streams = self.streams.write().map_err(|_| poisoned())?;

        let stream = streams.entry(stream_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {stream_id} is at version {current}, append expected {expected_version:?}"
            )));
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                stream: e.stream,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(&self, stream: StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;

        Ok(streams.get(&stream).cloned().unwrap_or_default())
    }
}
