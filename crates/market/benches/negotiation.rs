use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use adboard_core::{ExpectedVersion, ListingId, Money, StreamId, UserId};
use adboard_listings::{
    Category, Listing, ListingCommand, ListingEvent, ListingKind, ListingOpened, ListingViewed,
    OpenListing, SubmitProposal,
};
use adboard_market::command_dispatcher::CommandDispatcher;
use adboard_market::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use adboard_market::projections::{CatalogEntry, CatalogProjection};
use adboard_market::read_model::InMemoryKeyValueStore;

/// Mutable-row baseline: the shape this system would have without an event
/// log. One row per listing, updated in place.
#[derive(Debug, Clone)]
struct MutableCatalog {
    rows: Arc<RwLock<HashMap<ListingId, CatalogRow>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogRow {
    title: String,
    views: u64,
}

impl MutableCatalog {
    fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn upsert(&self, listing_id: ListingId, title: String) {
        let mut rows = self.rows.write().unwrap();
        rows.insert(listing_id, CatalogRow { title, views: 0 });
    }

    fn bump_views(&self, listing_id: ListingId) -> bool {
        let mut rows = self.rows.write().unwrap();
        match rows.get_mut(&listing_id) {
            Some(row) => {
                row.views += 1;
                true
            }
            None => false,
        }
    }
}

fn open_command(listing_id: ListingId, owner: UserId) -> ListingCommand {
    ListingCommand::OpenListing(OpenListing {
        listing_id,
        kind: ListingKind::Sale,
        owner,
        title: "Road bike".to_string(),
        category: Category::Vehicles,
        description: "Mid-range road bike".to_string(),
        price: Money::from_major(100),
        negotiable: true,
        occurred_at: Utc::now(),
    })
}

fn open_listing(dispatcher: &CommandDispatcher<InMemoryEventStore>, owner: UserId) -> ListingId {
    let listing_id = ListingId::next();
    dispatcher
        .dispatch::<Listing>(
            StreamId::Listing(listing_id),
            open_command(listing_id, owner),
            |_| Listing::empty(listing_id),
        )
        .unwrap();
    listing_id
}

fn view_event(listing_id: ListingId) -> ListingEvent {
    ListingEvent::ListingViewed(ListingViewed {
        listing_id,
        occurred_at: Utc::now(),
    })
}

/// Write-path latency through the full dispatch pipeline: load, rehydrate,
/// decide, append, project.
fn negotiation_write_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("negotiation_write_latency");
    group.sample_size(1000);

    // Fresh stream: no history to rehydrate.
    group.bench_function("open_listing", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let owner = UserId::new();
        b.iter(|| {
            black_box(open_listing(&dispatcher, owner));
        });
    });

    // Each bid replays one stream whose history grows as the loop runs, so
    // this measures rehydration cost on an active listing.
    group.bench_function("submit_proposal", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let listing_id = open_listing(&dispatcher, UserId::new());

        b.iter(|| {
            let bid = SubmitProposal {
                listing_id,
                proposer: UserId::new(),
                amount: black_box(Money::from_major(90)),
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch::<Listing>(
                    StreamId::Listing(listing_id),
                    ListingCommand::SubmitProposal(bid),
                    |_| Listing::empty(listing_id),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn store_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_append_throughput");

    for batch in [1usize, 8, 64, 512] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, &batch| {
            let store = InMemoryEventStore::new();
            let listing_id = ListingId::next();
            let stream = StreamId::Listing(listing_id);

            b.iter(|| {
                let events: Vec<UncommittedEvent> = (0..batch)
                    .map(|_| {
                        UncommittedEvent::from_typed(
                            stream,
                            uuid::Uuid::now_v7(),
                            &view_event(listing_id),
                        )
                        .unwrap()
                    })
                    .collect();

                black_box(store.append(events, ExpectedVersion::Any).unwrap());
            });
        });
    }

    group.finish();
}

/// Replaying the log into a fresh catalog, the recovery path after a read
/// model is lost or a projection changes shape.
fn catalog_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_rebuild");

    for history_len in [16u64, 128, 1024, 8192] {
        group.bench_with_input(
            BenchmarkId::new("events", history_len),
            &history_len,
            |b, &history_len| {
                let store = InMemoryEventStore::new();
                let listing_id = ListingId::next();
                let stream = StreamId::Listing(listing_id);

                let opened = ListingEvent::ListingOpened(ListingOpened {
                    listing_id,
                    kind: ListingKind::Sale,
                    owner: UserId::new(),
                    title: "Road bike".to_string(),
                    category: Category::Vehicles,
                    description: "Mid-range road bike".to_string(),
                    price: Money::from_major(100),
                    negotiable: true,
                    occurred_at: Utc::now(),
                });
                let first = UncommittedEvent::from_typed(stream, uuid::Uuid::now_v7(), &opened)
                    .unwrap();
                let mut history = store
                    .append(vec![first], ExpectedVersion::Exact(0))
                    .unwrap();
                for seq in 1..history_len {
                    let viewed = UncommittedEvent::from_typed(
                        stream,
                        uuid::Uuid::now_v7(),
                        &view_event(listing_id),
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![viewed], ExpectedVersion::Exact(seq))
                        .unwrap();
                    history.extend(stored);
                }
                let envelopes: Vec<_> = history.iter().map(|e| e.to_envelope()).collect();

                let entries: Arc<InMemoryKeyValueStore<ListingId, CatalogEntry>> =
                    Arc::new(InMemoryKeyValueStore::new());
                let projection = CatalogProjection::new(entries);

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Same open-then-view workload through the event log and through a plain
/// mutable table, to keep the log's overhead visible.
fn log_vs_mutable_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_vs_mutable_rows");
    group.sample_size(1000);

    group.bench_function("event_log", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let owner = UserId::new();

        b.iter(|| {
            let listing_id = open_listing(&dispatcher, owner);
            let view = adboard_listings::RecordView {
                listing_id,
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch::<Listing>(
                    StreamId::Listing(listing_id),
                    ListingCommand::RecordView(view),
                    |_| Listing::empty(listing_id),
                )
                .unwrap();
        });
    });

    group.bench_function("mutable_rows", |b| {
        let catalog = MutableCatalog::new();
        let listing_id = ListingId::next();

        b.iter(|| {
            catalog.upsert(listing_id, "Road bike".to_string());
            black_box(catalog.bump_views(listing_id));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    negotiation_write_latency,
    store_append_throughput,
    catalog_rebuild,
    log_vs_mutable_rows
);
criterion_main!(benches);
