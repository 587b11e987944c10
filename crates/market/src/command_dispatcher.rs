//! Command execution pipeline.
//!
//! One path runs every marketplace command, whether it targets a user, a
//! listing, or a transaction: load the stream, rehydrate the aggregate, let
//! it decide, append what it decided with an optimistic concurrency check,
//! then hand the committed events to every registered projection. Delivery is
//! synchronous and in commit order, so a query issued right after a command
//! observes that command's effects; there is no bus and no background thread.
//!
//! Events are durable (appended) before any projection sees them. A
//! projection failure therefore never loses history: it surfaces as
//! [`DispatchError::Projection`] and the read model can be rebuilt from the
//! log.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use adboard_core::{Aggregate, DomainError, ExpectedVersion, StreamId};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::projections::Projection;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Conflicting state: a stale aggregate version, or a business rule
    /// that another stream's state currently blocks.
    #[error("conflicting state: {0}")]
    Concurrency(String),
    /// Stream integrity violation (cross-stream event mixing).
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),
    /// The aggregate rejected the command's input.
    #[error("invalid input: {0}")]
    Validation(String),
    /// The aggregate refused the command to keep an invariant intact.
    #[error("invariant broken: {0}")]
    InvariantViolation(String),
    /// The targeted listing, user, or transaction has no history.
    #[error("not found")]
    NotFound,
    /// A historical payload no longer parses as the aggregate's event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),
    /// The append itself failed.
    #[error("event store failure: {0}")]
    Store(#[source] EventStoreError),
    /// A projection rejected a committed event (events are already persisted).
    #[error("projection failure: {0}")]
    Projection(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::StreamMismatch(msg) => DispatchError::StreamMismatch(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Runs commands against event-sourced aggregates.
///
/// Owns the event store and the list of projections; [`MarketService`] calls
/// into it for every write, whichever aggregate the write targets. Aggregates
/// stay pure (no store, no projections in sight), which is what keeps them
/// unit-testable with plain command/event assertions.
///
/// Each dispatch touches exactly one stream. Conflicts between concurrent
/// writers on the same stream surface as [`DispatchError::Concurrency`] and
/// are resolved by re-running the command against fresh state.
///
/// [`MarketService`]: crate::service::MarketService
pub struct CommandDispatcher<S> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Register a projection to receive every committed event, in commit order.
    pub fn register_projection(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Run one command against the aggregate behind `stream`.
    ///
    /// Loads and sanity-checks the stream, rehydrates a fresh aggregate built
    /// by `make_aggregate` (e.g. `Listing::empty`), asks it to decide, then
    /// appends the decided events expecting the version the load observed. If
    /// another writer advanced the stream in between, the append fails with
    /// [`DispatchError::Concurrency`] and nothing is persisted. Committed
    /// events are fed to every registered projection before returning.
    ///
    /// Returns the committed events with their assigned sequence numbers. A
    /// command that decides no events returns an empty vector without touching
    /// the store.
    pub fn dispatch<A>(
        &self,
        stream: StreamId,
        command: A::Command,
        make_aggregate: impl FnOnce(StreamId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: adboard_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(stream)?;
        validate_loaded_stream(stream, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));
        debug!(%stream, history = history.len(), ?command, "handling command");

        let mut aggregate = make_aggregate(stream);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            debug!(%stream, "command decided no events");
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(stream, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(%stream, appended = committed.len(), "events committed");

        // Projections only ever see durable events.
        for stored in &committed {
            let envelope = stored.to_envelope();
            for projection in &self.projections {
                projection.apply_envelope(&envelope).map_err(|e| {
                    DispatchError::Projection(format!("{}: {e}", projection.name()))
                })?;
            }
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

// Rejects foreign events and sequence gaps before rehydration. A backend
// bug here would otherwise corrupt aggregate state silently.
fn validate_loaded_stream(stream_id: StreamId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.stream != stream_id {
            return Err(DispatchError::StreamMismatch(format!(
                "event at index {idx} belongs to {}, expected {stream_id}",
                e.stream
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "sequence numbers must strictly increase (saw {} after {last})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

/// Rehydrate an aggregate from stored history.
///
/// Sorts by sequence number for deterministic ordering, deserializes each payload
/// into the aggregate's event type, and applies them in order. Shared with the
/// application service, which rehydrates aggregates for read paths that never
/// dispatch a command.
pub fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
