//! Application service: the façade the CLI (and tests) talk to.
//!
//! `MarketService` owns the event store, the command dispatcher, and every
//! read model. Each operation runs one or more commands through the
//! dispatcher; because projection delivery is synchronous, a query issued
//! right after an operation observes its effects.
//!
//! Cross-aggregate policy lives here, not in the aggregates:
//! - Only registered, active users may open listings or submit proposals.
//! - Accepting a proposal mints a transaction and records the outcome on
//!   both parties.
//! - A user still referenced by a listing, a pending proposal, or a trade
//!   record cannot deregister.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use adboard_core::{DomainError, ListingId, Money, StreamId, TransactionId, UserId};
use adboard_listings::{
    AcceptBestProposal, Category, ChangeCategory, ChangeDescription, ChangePrice, ChangeTitle,
    ExtendHighlight, FeatureListing, Listing, ListingCommand, ListingKind, ListingSnapshot,
    OpenListing, PendingProposal, RecordView, RefuseBestProposal, SetNegotiable, SubmitProposal,
    WithdrawListing,
};
use adboard_transactions::{RecordTransaction, Transaction, TransactionCommand};
use adboard_users::{
    ChangeContact, DeregisterUser, RecordTradeOutcome, RegisterUser, Relocate, RenameUser,
    TradeSide, User, UserCommand,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, apply_history};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{
    CatalogEntry, CatalogProjection, DirectoryProjection, ReferenceLedgerProjection,
    TradeLedgerProjection, TradeRecord, UserCard,
};
use crate::read_model::InMemoryKeyValueStore;
use crate::review::{ReviewDecision, ReviewOutcome, ReviewPrompt};

type Catalog = CatalogProjection<Arc<InMemoryKeyValueStore<ListingId, CatalogEntry>>>;
type Directory = DirectoryProjection<Arc<InMemoryKeyValueStore<UserId, UserCard>>>;
type References = ReferenceLedgerProjection<Arc<InMemoryKeyValueStore<UserId, u64>>>;
type Trades = TradeLedgerProjection<Arc<InMemoryKeyValueStore<UserId, Vec<TradeRecord>>>>;

/// The marketplace, fully wired: store, dispatcher, and read models.
pub struct MarketService {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>>,
    store: Arc<InMemoryEventStore>,
    catalog: Arc<Catalog>,
    directory: Arc<Directory>,
    references: Arc<References>,
    trades: Arc<Trades>,
}

impl Default for MarketService {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketService {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryEventStore::new());

        let catalog: Arc<Catalog> =
            Arc::new(CatalogProjection::new(Arc::new(InMemoryKeyValueStore::new())));
        let directory: Arc<Directory> =
            Arc::new(DirectoryProjection::new(Arc::new(InMemoryKeyValueStore::new())));
        let references: Arc<References> =
            Arc::new(ReferenceLedgerProjection::new(Arc::new(InMemoryKeyValueStore::new())));
        let trades: Arc<Trades> =
            Arc::new(TradeLedgerProjection::new(Arc::new(InMemoryKeyValueStore::new())));

        let mut dispatcher = CommandDispatcher::new(store.clone());
        dispatcher.register_projection(catalog.clone());
        dispatcher.register_projection(directory.clone());
        dispatcher.register_projection(references.clone());
        dispatcher.register_projection(trades.clone());

        Self {
            dispatcher,
            store,
            catalog,
            directory,
            references,
            trades,
        }
    }

    // ---- users ----------------------------------------------------------

    /// Register a new marketplace member.
    pub fn register_user(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        city: impl Into<String>,
    ) -> Result<UserId, DispatchError> {
        let user_id = UserId::new();
        self.dispatch_user(
            user_id,
            UserCommand::RegisterUser(RegisterUser {
                user_id,
                name: name.into(),
                email: email.into(),
                city: city.into(),
                occurred_at: Utc::now(),
            }),
        )?;

        info!(user = %user_id, "user registered");
        Ok(user_id)
    }

    pub fn rename_user(&self, user_id: UserId, name: impl Into<String>) -> Result<(), DispatchError> {
        self.dispatch_user(
            user_id,
            UserCommand::RenameUser(RenameUser {
                user_id,
                name: name.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn change_contact(
        &self,
        user_id: UserId,
        email: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.dispatch_user(
            user_id,
            UserCommand::ChangeContact(ChangeContact {
                user_id,
                email: email.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn relocate_user(&self, user_id: UserId, city: impl Into<String>) -> Result<(), DispatchError> {
        self.dispatch_user(
            user_id,
            UserCommand::Relocate(Relocate {
                user_id,
                city: city.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Remove a member from the registry.
    ///
    /// Refused while anything still points at them: an open listing they
    /// own, a pending proposal they submitted, or a recorded trade. The
    /// caller must withdraw listings (which drains proposals) first; trade
    /// records are permanent, so a user who ever traded stays.
    pub fn deregister_user(&self, user_id: UserId) -> Result<(), DispatchError> {
        if self.references.is_referenced(&user_id) {
            return Err(DomainError::conflict(
                "user is still referenced by listings, proposals, or trades",
            )
            .into());
        }

        self.dispatch_user(
            user_id,
            UserCommand::DeregisterUser(DeregisterUser {
                user_id,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(user = %user_id, "user deregistered");
        Ok(())
    }

    // ---- listings -------------------------------------------------------

    /// Open a listing on behalf of a registered, active user.
    ///
    /// Assigns the listing id from the process-wide counter.
    #[allow(clippy::too_many_arguments)]
    pub fn open_listing(
        &self,
        owner: UserId,
        kind: ListingKind,
        title: impl Into<String>,
        category: Category,
        description: impl Into<String>,
        price: Money,
        negotiable: bool,
    ) -> Result<ListingId, DispatchError> {
        self.ensure_active_user(owner)?;

        let listing_id = ListingId::next();
        self.dispatch_listing(
            listing_id,
            ListingCommand::OpenListing(OpenListing {
                listing_id,
                kind,
                owner,
                title: title.into(),
                category,
                description: description.into(),
                price,
                negotiable,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(listing = %listing_id, owner = %owner, kind = %kind, "listing opened");
        Ok(listing_id)
    }

    pub fn change_title(
        &self,
        listing_id: ListingId,
        title: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::ChangeTitle(ChangeTitle {
                listing_id,
                title: title.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn change_description(
        &self,
        listing_id: ListingId,
        description: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::ChangeDescription(ChangeDescription {
                listing_id,
                description: description.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn change_category(
        &self,
        listing_id: ListingId,
        category: Category,
    ) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::ChangeCategory(ChangeCategory {
                listing_id,
                category,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn change_price(&self, listing_id: ListingId, price: Money) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::ChangePrice(ChangePrice {
                listing_id,
                price,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn set_negotiable(
        &self,
        listing_id: ListingId,
        negotiable: bool,
    ) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::SetNegotiable(SetNegotiable {
                listing_id,
                negotiable,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Count one consultation of the listing.
    pub fn record_view(&self, listing_id: ListingId) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::RecordView(RecordView {
                listing_id,
                occurred_at: Utc::now(),
            }),
        )?;
        debug!(listing = %listing_id, "view recorded");
        Ok(())
    }

    /// Put the listing in the highlighted band until the given date.
    pub fn feature_listing(
        &self,
        listing_id: ListingId,
        until: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::FeatureListing(FeatureListing {
                listing_id,
                until,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Extend an existing highlight by whole days.
    pub fn extend_highlight(&self, listing_id: ListingId, days: u32) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::ExtendHighlight(ExtendHighlight {
                listing_id,
                days,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Submit a proposal on behalf of a registered, active user.
    pub fn submit_proposal(
        &self,
        listing_id: ListingId,
        proposer: UserId,
        amount: Money,
    ) -> Result<(), DispatchError> {
        self.ensure_active_user(proposer)?;

        self.dispatch_listing(
            listing_id,
            ListingCommand::SubmitProposal(SubmitProposal {
                listing_id,
                proposer,
                amount,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(listing = %listing_id, proposer = %proposer, amount = %amount, "proposal submitted");
        Ok(())
    }

    /// Take the listing off the market.
    ///
    /// Every pending proposal is refused on the way out, so no proposer is
    /// left referenced by a closed listing.
    pub fn withdraw_listing(&self, listing_id: ListingId) -> Result<(), DispatchError> {
        self.dispatch_listing(
            listing_id,
            ListingCommand::WithdrawListing(WithdrawListing {
                listing_id,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(listing = %listing_id, "listing withdrawn");
        Ok(())
    }

    // ---- negotiation ----------------------------------------------------

    /// Run one negotiation round on a listing.
    ///
    /// Presents the best pending proposal (highest amount, earliest on
    /// ties) to the prompt and acts on the verdict:
    /// - **Accept**: pops the best proposal, mints a transaction, and
    ///   records the outcome on both parties. The listing stays open and
    ///   the remaining proposals are retained for a future round.
    /// - **Refuse**: pops the best proposal; nothing else changes.
    /// - **Back**: changes nothing.
    ///
    /// An empty book is reported to the prompt and is not an error.
    pub fn review_proposals(
        &self,
        listing_id: ListingId,
        prompt: &mut dyn ReviewPrompt,
    ) -> Result<ReviewOutcome, DispatchError> {
        let listing = self.load_listing(listing_id)?;

        let Some(best) = listing.best_proposal().cloned() else {
            prompt.report_no_proposals();
            return Ok(ReviewOutcome::NoProposals);
        };

        let proposer_name = self
            .directory
            .get(&best.proposer)
            .map(|card| card.name)
            .unwrap_or_else(|| best.proposer.to_string());

        match prompt.choose(best.amount, &proposer_name) {
            ReviewDecision::Accept => self.accept_best(&listing, &best),
            ReviewDecision::Refuse => {
                self.dispatch_listing(
                    listing_id,
                    ListingCommand::RefuseBestProposal(RefuseBestProposal {
                        listing_id,
                        occurred_at: Utc::now(),
                    }),
                )?;

                info!(listing = %listing_id, proposer = %best.proposer, amount = %best.amount, "proposal refused");
                Ok(ReviewOutcome::Refused {
                    seq: best.seq,
                    proposer: best.proposer,
                    amount: best.amount,
                })
            }
            ReviewDecision::Back => Ok(ReviewOutcome::Backed),
        }
    }

    fn accept_best(
        &self,
        listing: &Listing,
        best: &PendingProposal,
    ) -> Result<ReviewOutcome, DispatchError> {
        let listing_id = listing.id_typed();
        let owner = listing
            .owner()
            .ok_or_else(|| DispatchError::from(DomainError::invariant("listing has no owner")))?;

        // Pop the best proposal; the listing stays open for further rounds.
        self.dispatch_listing(
            listing_id,
            ListingCommand::AcceptBestProposal(AcceptBestProposal {
                listing_id,
                occurred_at: Utc::now(),
            }),
        )?;

        // Mint the transaction.
        let transaction_id = TransactionId::new();
        let recorded_at = Utc::now();
        self.dispatcher.dispatch::<Transaction>(
            StreamId::Transaction(transaction_id),
            TransactionCommand::RecordTransaction(RecordTransaction {
                transaction_id,
                listing_id,
                listing_kind: listing.kind(),
                amount: best.amount,
                owner,
                proposer: best.proposer,
                occurred_at: recorded_at,
            }),
            |_| Transaction::empty(transaction_id),
        )?;

        // Record the outcome on both parties.
        let (buyer, seller) = match listing.kind() {
            ListingKind::Purchase => (owner, best.proposer),
            ListingKind::Sale => (best.proposer, owner),
        };
        self.dispatch_user(
            buyer,
            UserCommand::RecordTradeOutcome(RecordTradeOutcome {
                user_id: buyer,
                side: TradeSide::Bought,
                transaction_id,
                occurred_at: recorded_at,
            }),
        )?;
        self.dispatch_user(
            seller,
            UserCommand::RecordTradeOutcome(RecordTradeOutcome {
                user_id: seller,
                side: TradeSide::Sold,
                transaction_id,
                occurred_at: recorded_at,
            }),
        )?;

        info!(
            listing = %listing_id,
            transaction = %transaction_id,
            buyer = %buyer,
            seller = %seller,
            amount = %best.amount,
            "proposal accepted, transaction recorded"
        );

        Ok(ReviewOutcome::Accepted {
            transaction: TradeRecord {
                transaction_id,
                listing_id,
                listing_kind: listing.kind(),
                amount: best.amount,
                buyer,
                seller,
                recorded_at,
            },
        })
    }

    // ---- snapshots ------------------------------------------------------

    /// Export a listing as self-contained snapshot JSON.
    pub fn export_listing(&self, listing_id: ListingId) -> Result<String, DispatchError> {
        let listing = self.load_listing(listing_id)?;
        let snapshot = listing.snapshot().map_err(DispatchError::from)?;
        snapshot
            .to_json()
            .map_err(|e| DispatchError::Deserialize(format!("snapshot serialization failed: {e}")))
    }

    /// Restore a listing from snapshot JSON.
    ///
    /// Returns a detached aggregate: the listing is validated and its id is
    /// claimed from the counter, but nothing is appended to the event log.
    pub fn import_listing(&self, json: &str) -> Result<Listing, DispatchError> {
        let snapshot = ListingSnapshot::from_json(json)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        Listing::from_snapshot(snapshot).map_err(DispatchError::from)
    }

    // ---- queries --------------------------------------------------------

    pub fn listing(&self, listing_id: &ListingId) -> Option<CatalogEntry> {
        self.catalog.get(listing_id)
    }

    pub fn search_catalog(&self, query: &str) -> Vec<CatalogEntry> {
        self.catalog.search_text(query)
    }

    pub fn open_listings(&self) -> Vec<CatalogEntry> {
        self.catalog.open_listings()
    }

    pub fn listings_by_owner(&self, owner: UserId) -> Vec<CatalogEntry> {
        self.catalog.listings_by_owner(owner)
    }

    pub fn duplicate_titles(&self, title: &str) -> Vec<CatalogEntry> {
        self.catalog.duplicate_titles(title)
    }

    pub fn user(&self, user_id: &UserId) -> Option<UserCard> {
        self.directory.get(user_id)
    }

    pub fn active_users(&self) -> Vec<UserCard> {
        self.directory.active_users()
    }

    pub fn most_active_users(&self, n: usize) -> Vec<UserCard> {
        self.directory.most_active(n)
    }

    pub fn trade_history(&self, user_id: &UserId) -> Vec<TradeRecord> {
        self.trades.history(user_id)
    }

    pub fn is_referenced(&self, user_id: &UserId) -> bool {
        self.references.is_referenced(user_id)
    }

    // ---- maintenance ----------------------------------------------------

    /// Throw away and rebuild every read model from the event log.
    pub fn rebuild_read_models(&self) -> Result<(), DispatchError> {
        let envelopes: Vec<_> = self
            .store
            .all_events()?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();

        self.catalog
            .rebuild_from_scratch(envelopes.clone())
            .map_err(|e| DispatchError::Projection(format!("market.catalog: {e}")))?;
        self.directory
            .rebuild_from_scratch(envelopes.clone())
            .map_err(|e| DispatchError::Projection(format!("market.directory: {e}")))?;
        self.references
            .rebuild_from_scratch(envelopes.clone())
            .map_err(|e| DispatchError::Projection(format!("market.references: {e}")))?;
        self.trades
            .rebuild_from_scratch(envelopes)
            .map_err(|e| DispatchError::Projection(format!("market.trades: {e}")))?;

        info!("read models rebuilt from the event log");
        Ok(())
    }

    // ---- internals ------------------------------------------------------

    fn dispatch_user(
        &self,
        user_id: UserId,
        command: UserCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch::<User>(StreamId::User(user_id), command, |_| User::empty(user_id))
    }

    fn dispatch_listing(
        &self,
        listing_id: ListingId,
        command: ListingCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Listing>(StreamId::Listing(listing_id), command, |_| {
            Listing::empty(listing_id)
        })
    }

    /// Rehydrate a listing for read paths that never dispatch a command.
    fn load_listing(&self, listing_id: ListingId) -> Result<Listing, DispatchError> {
        let history = self.store.load_stream(StreamId::Listing(listing_id))?;
        if history.is_empty() {
            return Err(DispatchError::NotFound);
        }

        let mut listing = Listing::empty(listing_id);
        apply_history::<Listing>(&mut listing, &history)?;
        Ok(listing)
    }

    fn ensure_active_user(&self, user_id: UserId) -> Result<(), DispatchError> {
        match self.directory.get(&user_id) {
            Some(card) if card.active => Ok(()),
            Some(_) => Err(DomainError::invariant("user is deregistered").into()),
            None => Err(DispatchError::NotFound),
        }
    }
}
