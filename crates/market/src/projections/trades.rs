use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use adboard_core::{ListingId, Money, StreamId, TransactionId, UserId};
use adboard_events::EventEnvelope;
use adboard_listings::ListingKind;
use adboard_transactions::TransactionEvent;

use crate::projections::{CursorCheck, Projection, ProjectionError, StreamCursors};
use crate::read_model::KeyValueStore;

/// One concluded trade as seen from a party's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub transaction_id: TransactionId,
    pub listing_id: ListingId,
    pub listing_kind: ListingKind,
    pub amount: Money,
    pub buyer: UserId,
    pub seller: UserId,
    pub recorded_at: DateTime<Utc>,
}

/// Trade ledger projection: per-user transaction history.
///
/// Every recorded transaction is appended to BOTH parties' histories, in
/// recording order. Histories are append-only.
#[derive(Debug)]
pub struct TradeLedgerProjection<S>
where
    S: KeyValueStore<UserId, Vec<TradeRecord>>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> TradeLedgerProjection<S>
where
    S: KeyValueStore<UserId, Vec<TradeRecord>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// A user's trade history, oldest first.
    pub fn history(&self, user: &UserId) -> Vec<TradeRecord> {
        self.store.get(user).unwrap_or_default()
    }

    /// Number of trades a user took part in.
    pub fn record_count(&self, user: &UserId) -> usize {
        self.history(user).len()
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

    fn append(&self, user: UserId, record: TradeRecord) {
        let mut history = self.store.get(&user).unwrap_or_default();
        history.push(record);
        self.store.upsert(user, history);
    }
}

impl<S> Projection for TradeLedgerProjection<S>
where
    S: KeyValueStore<UserId, Vec<TradeRecord>>,
{
    fn name(&self) -> &str {
        "market.trades"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.stream_kind() != "transactions.transaction" {
            return Ok(());
        }

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

        match event {
            TransactionEvent::TransactionRecorded(e) => {
                let record = TradeRecord {
                    transaction_id: e.transaction_id,
                    listing_id: e.listing_id,
                    listing_kind: e.listing_kind,
                    amount: e.amount,
                    buyer: e.buyer,
                    seller: e.seller,
                    recorded_at: e.occurred_at,
                };
                self.append(e.buyer, record.clone());
                self.append(e.seller, record);
            }
        }

        self.cursors.advance(envelope.stream(), seq);

        Ok(())
    }
}
