use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use adboard_core::{ListingId, Money, StreamId, UserId};
use adboard_events::EventEnvelope;
use adboard_listings::{Category, ListingEvent, ListingKind, ListingStatus};

use crate::projections::{CursorCheck, Projection, ProjectionError, StreamCursors};
use crate::read_model::KeyValueStore;

/// One pending offer as the catalog shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferSummary {
    pub seq: u64,
    pub proposer: UserId,
    pub amount: Money,
}

/// Queryable listing read model: the public face of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub listing_id: ListingId,
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
    /// Pending offers, best first (highest amount, earliest on ties).
    pub offers: Vec<OfferSummary>,
}

impl CatalogEntry {
    pub fn best_offer(&self) -> Option<&OfferSummary> {
        self.offers.first()
    }

    pub fn pending_count(&self) -> usize {
        self.offers.len()
    }
}

/// Listing catalog projection.
///
/// Consumes listing envelopes and maintains the read model behind catalog
/// queries: text search, the per-owner registry lookup, and duplicate-title
/// detection.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: KeyValueStore<ListingId, CatalogEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: KeyValueStore<ListingId, CatalogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Query one listing.
    pub fn get(&self, listing_id: &ListingId) -> Option<CatalogEntry> {
        self.store.get(listing_id)
    }

    /// The whole catalog, ordered by listing id.
    pub fn list(&self) -> Vec<CatalogEntry> {
        let mut entries = self.store.list();
        entries.sort_by_key(|e| e.listing_id);
        entries
    }

    /// Listings still open for business.
    pub fn open_listings(&self) -> Vec<CatalogEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.status == ListingStatus::Open)
            .collect()
    }

    /// Case-insensitive substring search over title and description.
    pub fn search_text(&self, query: &str) -> Vec<CatalogEntry> {
        let q = query.to_lowercase();
        self.list()
            .into_iter()
            .filter(|e| {
                e.title.to_lowercase().contains(&q) || e.description.to_lowercase().contains(&q)
            })
            .collect()
    }

    /// Registry lookup: every listing a user authored.
    pub fn listings_by_owner(&self, owner: UserId) -> Vec<CatalogEntry> {
        self.list().into_iter().filter(|e| e.owner == owner).collect()
    }

    /// Listings sharing a title exactly. Title equality is case-sensitive.
    pub fn duplicate_titles(&self, title: &str) -> Vec<CatalogEntry> {
        self.list().into_iter().filter(|e| e.title == title).collect()
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear();

        // Deterministic replay order: stream, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (e.stream(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }

    // Streams open before they mutate; a stray event for an unknown listing
    // is ignored rather than fabricated.
    fn update(&self, id: ListingId, f: impl FnOnce(&mut CatalogEntry)) {
        if let Some(mut entry) = self.store.get(&id) {
            f(&mut entry);
            self.store.upsert(id, entry);
        }
    }
}

impl<S> Projection for CatalogProjection<S>
where
    S: KeyValueStore<ListingId, CatalogEntry>,
{
    fn name(&self) -> &str {
        "market.catalog"
    }

    /// Apply a committed envelope into the projection.
    ///
    /// - Ignores non-listing streams (one delivery path is shared by all projections)
    /// - Enforces monotonic sequence per stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.stream_kind() != "listings.listing" {
            return Ok(());
        }

        let seq = envelope.sequence_number();
        if let CursorCheck::Skip = self.cursors.check(envelope.stream(), seq)? {
            return Ok(());
        }

        let event: ListingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        // Validate stream identity at the event level.
        if StreamId::Listing(event.listing_id()) != envelope.stream() {
            return Err(ProjectionError::StreamMismatch(
                "event listing_id does not match envelope stream".to_string(),
            ));
        }

        match event {
            ListingEvent::ListingOpened(e) => {
                self.store.upsert(
                    e.listing_id,
                    CatalogEntry {
                        listing_id: e.listing_id,
                        kind: e.kind,
                        owner: e.owner,
                        title: e.title,
                        category: e.category,
                        description: e.description,
                        price: e.price,
                        negotiable: e.negotiable,
                        featured: false,
                        highlight_until: None,
                        views: 0,
                        status: ListingStatus::Open,
                        created_at: e.occurred_at,
                        offers: Vec::new(),
                    },
                );
            }
            ListingEvent::TitleChanged(e) => {
                self.update(e.listing_id, |entry| entry.title = e.title);
            }
            ListingEvent::DescriptionChanged(e) => {
                self.update(e.listing_id, |entry| entry.description = e.description);
            }
            ListingEvent::CategoryChanged(e) => {
                self.update(e.listing_id, |entry| entry.category = e.category);
            }
            ListingEvent::PriceChanged(e) => {
                self.update(e.listing_id, |entry| entry.price = e.price);
            }
            ListingEvent::NegotiableSet(e) => {
                self.update(e.listing_id, |entry| entry.negotiable = e.negotiable);
            }
            ListingEvent::ListingViewed(e) => {
                self.update(e.listing_id, |entry| entry.views += 1);
            }
            ListingEvent::ListingFeatured(e) => {
                self.update(e.listing_id, |entry| {
                    entry.featured = true;
                    entry.highlight_until = Some(e.until);
                });
            }
            ListingEvent::HighlightExtended(e) => {
                self.update(e.listing_id, |entry| entry.highlight_until = Some(e.until));
            }
            ListingEvent::ProposalSubmitted(e) => {
                self.update(e.listing_id, |entry| {
                    entry.offers.push(OfferSummary {
                        seq: e.seq,
                        proposer: e.proposer,
                        amount: e.amount,
                    });
                    // Best first: highest amount, earliest submission on ties.
                    entry
                        .offers
                        .sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.seq.cmp(&b.seq)));
                });
            }
            ListingEvent::ProposalAccepted(e) => {
                self.update(e.listing_id, |entry| entry.offers.retain(|o| o.seq != e.seq));
            }
            ListingEvent::ProposalRefused(e) => {
                self.update(e.listing_id, |entry| entry.offers.retain(|o| o.seq != e.seq));
            }
            ListingEvent::ListingWithdrawn(e) => {
                self.update(e.listing_id, |entry| entry.status = ListingStatus::Withdrawn);
            }
        }

        // Advance cursor after successful apply.
        self.cursors.advance(envelope.stream(), seq);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use adboard_core::Money;
    use adboard_events::Event;
    use adboard_listings::{ListingOpened, ListingViewed, ProposalSubmitted};

    use crate::read_model::InMemoryKeyValueStore;

    fn make_envelope(listing_id: ListingId, seq: u64, event: ListingEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            StreamId::Listing(listing_id),
            seq,
            event.event_type(),
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn opened(listing_id: ListingId, owner: UserId, title: &str) -> ListingEvent {
        ListingEvent::ListingOpened(ListingOpened {
            listing_id,
            kind: ListingKind::Purchase,
            owner,
            title: title.to_string(),
            category: Category::Electronics,
            description: "a well-loved camera".to_string(),
            price: Money::from_major(100),
            negotiable: true,
            occurred_at: Utc::now(),
        })
    }

    fn submitted(listing_id: ListingId, seq: u64, proposer: UserId, amount: Money) -> ListingEvent {
        ListingEvent::ProposalSubmitted(ProposalSubmitted {
            listing_id,
            seq,
            proposer,
            amount,
            occurred_at: Utc::now(),
        })
    }

    fn new_projection() -> CatalogProjection<Arc<InMemoryKeyValueStore<ListingId, CatalogEntry>>> {
        CatalogProjection::new(Arc::new(InMemoryKeyValueStore::new()))
    }

    #[test]
    fn builds_entry_from_opened_event() {
        let proj = new_projection();
        let id = ListingId::next();
        let owner = UserId::new();

        proj.apply_envelope(&make_envelope(id, 1, opened(id, owner, "Vintage camera")))
            .unwrap();

        let entry = proj.get(&id).expect("entry should exist");
        assert_eq!(entry.title, "Vintage camera");
        assert_eq!(entry.owner, owner);
        assert_eq!(entry.status, ListingStatus::Open);
        assert!(entry.offers.is_empty());
    }

    #[test]
    fn keeps_offers_best_first() {
        let proj = new_projection();
        let id = ListingId::next();
        let owner = UserId::new();
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());

        proj.apply_envelope(&make_envelope(id, 1, opened(id, owner, "Bike"))).unwrap();
        proj.apply_envelope(&make_envelope(id, 2, submitted(id, 1, a, Money::from_major(80))))
            .unwrap();
        proj.apply_envelope(&make_envelope(id, 3, submitted(id, 2, b, Money::from_major(120))))
            .unwrap();
        proj.apply_envelope(&make_envelope(id, 4, submitted(id, 3, c, Money::from_major(120))))
            .unwrap();

        let entry = proj.get(&id).unwrap();
        let amounts: Vec<_> = entry.offers.iter().map(|o| (o.amount, o.seq)).collect();
        assert_eq!(
            amounts,
            vec![
                (Money::from_major(120), 2),
                (Money::from_major(120), 3),
                (Money::from_major(80), 1),
            ]
        );
        assert_eq!(entry.best_offer().unwrap().proposer, b);
    }

    #[test]
    fn replayed_envelopes_are_ignored() {
        let proj = new_projection();
        let id = ListingId::next();
        let owner = UserId::new();

        proj.apply_envelope(&make_envelope(id, 1, opened(id, owner, "Sofa"))).unwrap();
        let view = make_envelope(
            id,
            2,
            ListingEvent::ListingViewed(ListingViewed {
                listing_id: id,
                occurred_at: Utc::now(),
            }),
        );
        proj.apply_envelope(&view).unwrap();
        proj.apply_envelope(&view).unwrap();

        assert_eq!(proj.get(&id).unwrap().views, 1);
    }

    #[test]
    fn rejects_sequence_gaps() {
        let proj = new_projection();
        let id = ListingId::next();
        let owner = UserId::new();

        proj.apply_envelope(&make_envelope(id, 1, opened(id, owner, "Desk"))).unwrap();
        let err = proj
            .apply_envelope(&make_envelope(
                id,
                3,
                ListingEvent::ListingViewed(ListingViewed {
                    listing_id: id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap_err();
        match err {
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 } => {}
            other => panic!("Expected NonMonotonicSequence, got {other:?}"),
        }
    }

    #[test]
    fn search_is_case_insensitive_but_duplicate_titles_are_exact() {
        let proj = new_projection();
        let owner = UserId::new();
        let (a, b) = (ListingId::next(), ListingId::next());

        proj.apply_envelope(&make_envelope(a, 1, opened(a, owner, "Vintage Camera"))).unwrap();
        proj.apply_envelope(&make_envelope(b, 1, opened(b, owner, "vintage camera"))).unwrap();

        assert_eq!(proj.search_text("VINTAGE").len(), 2);
        assert_eq!(proj.duplicate_titles("Vintage Camera").len(), 1);
    }

    #[test]
    fn rebuild_replays_out_of_order_input() {
        let proj = new_projection();
        let id = ListingId::next();
        let owner = UserId::new();
        let bidder = UserId::new();

        let envs = vec![
            make_envelope(id, 2, submitted(id, 1, bidder, Money::from_major(90))),
            make_envelope(id, 1, opened(id, owner, "Lamp")),
        ];

        proj.rebuild_from_scratch(envs).unwrap();

        let entry = proj.get(&id).unwrap();
        assert_eq!(entry.title, "Lamp");
        assert_eq!(entry.pending_count(), 1);
    }
}
