use serde_json::Value as JsonValue;

use adboard_core::{StreamId, UserId};
use adboard_events::EventEnvelope;
use adboard_listings::ListingEvent;
use adboard_transactions::TransactionEvent;

use crate::projections::{CursorCheck, Projection, ProjectionError, StreamCursors};
use crate::read_model::KeyValueStore;

/// Reference ledger: counts how many live marketplace objects point at each
/// user.
///
/// A user is referenced by:
/// - every listing they own, until it is withdrawn
/// - every pending proposal they submitted, until it is accepted or refused
/// - every transaction they took part in, permanently
///
/// `is_referenced` gates deregistration: a referenced user cannot leave,
/// otherwise listings, proposals, or trade records would point at nobody.
#[derive(Debug)]
pub struct ReferenceLedgerProjection<S>
where
    S: KeyValueStore<UserId, u64>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ReferenceLedgerProjection<S>
where
    S: KeyValueStore<UserId, u64>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Number of live references to this user.
    pub fn reference_count(&self, user: &UserId) -> u64 {
        self.store.get(user).unwrap_or(0)
    }

    /// Whether any live object still points at this user.
    pub fn is_referenced(&self, user: &UserId) -> bool {
        self.reference_count(user) > 0
    }

    /// Rebuild the ledger from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (e.stream(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }

    fn retain(&self, user: UserId) {
        let current = self.store.get(&user).unwrap_or(0);
        self.store.upsert(user, current.saturating_add(1));
    }

    fn release(&self, user: UserId) {
        let current = self.store.get(&user).unwrap_or(0);
        self.store.upsert(user, current.saturating_sub(1));
    }

    fn apply_listing(&self, event: ListingEvent) {
        match event {
            ListingEvent::ListingOpened(e) => self.retain(e.owner),
            ListingEvent::ProposalSubmitted(e) => self.retain(e.proposer),
            ListingEvent::ProposalAccepted(e) => self.release(e.proposer),
            ListingEvent::ProposalRefused(e) => self.release(e.proposer),
            ListingEvent::ListingWithdrawn(e) => self.release(e.owner),
            // Edits, views, and highlights do not change who is referenced.
            _ => {}
        }
    }

    fn apply_transaction(&self, event: TransactionEvent) {
        match event {
            TransactionEvent::TransactionRecorded(e) => {
                // Trade records are permanent; these references never drop.
                self.retain(e.buyer);
                self.retain(e.seller);
            }
        }
    }
}

impl<S> Projection for ReferenceLedgerProjection<S>
where
    S: KeyValueStore<UserId, u64>,
{
    fn name(&self) -> &str {
        "market.references"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.stream_kind() {
            "listings.listing" => {
                let seq = envelope.sequence_number();
                if let CursorCheck::Skip = self.cursors.check(envelope.stream(), seq)? {
                    return Ok(());
                }

                let event: ListingEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                if StreamId::Listing(event.listing_id()) != envelope.stream() {
                    return Err(ProjectionError::StreamMismatch(
                        "event listing_id does not match envelope stream".to_string(),
                    ));
                }

                self.apply_listing(event);
                self.cursors.advance(envelope.stream(), seq);
                Ok(())
            }
            "transactions.transaction" => {
                let seq = envelope.sequence_number();
                if let CursorCheck::Skip = self.cursors.check(envelope.stream(), seq)? {
                    return Ok(());
                }

                let event: TransactionEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                if StreamId::Transaction(event.transaction_id()) != envelope.stream() {
                    return Err(ProjectionError::StreamMismatch(
                        "event transaction_id does not match envelope stream".to_string(),
                    ));
                }

                self.apply_transaction(event);
                self.cursors.advance(envelope.stream(), seq);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
