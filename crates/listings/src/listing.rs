use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use adboard_core::{Aggregate, AggregateRoot, DomainError, ListingId, Money, UserId};
use adboard_events::Event;

use crate::category::Category;
use crate::proposal::{PendingProposal, ProposalBook};
use crate::snapshot::ListingSnapshot;

/// Listing variant. Purchase listings collect proposals and run the
/// accept/refuse review; sale listings are plain catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub enum ListingKind {
    Purchase,
    Sale,
}

impl ListingKind {
    /// Single-letter type code used on the wire and in summaries.
    pub fn code(&self) -> char {
        match self {
            ListingKind::Purchase => 'P',
            ListingKind::Sale => 'S',
        }
    }
}

impl From<ListingKind> for char {
    fn from(kind: ListingKind) -> Self {
        kind.code()
    }
}

impl TryFrom<char> for ListingKind {
    type Error = DomainError;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        match code {
            'P' => Ok(ListingKind::Purchase),
            'S' => Ok(ListingKind::Sale),
            other => Err(DomainError::validation(format!(
                "unknown listing kind code: {other}"
            ))),
        }
    }
}

impl core::fmt::Display for ListingKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Listing status lifecycle.
///
/// Accepting a proposal does not close the listing: the remaining proposals
/// stay reviewable and further deals can conclude. Only withdrawal ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Open,
    Withdrawn,
}

/// Aggregate root: Listing (a classified advertisement).
///
/// The owner is held as a `UserId` handle into the users registry, never as
/// an embedded user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    id: ListingId,
    kind: ListingKind,
    owner: Option<UserId>,
    title: String,
    category: Category,
    description: String,
    price: Money,
    negotiable: bool,
    featured: bool,
    highlight_until: Option<DateTime<Utc>>,
    views: u64,
    status: ListingStatus,
    proposals: ProposalBook,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Listing {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: ListingId) -> Self {
        Self {
            id,
            kind: ListingKind::Purchase,
            owner: None,
            title: String::new(),
            category: Category::Other,
            description: String::new(),
            price: Money::zero(),
            negotiable: false,
            featured: false,
            highlight_until: None,
            views: 0,
            status: ListingStatus::Open,
            proposals: ProposalBook::new(),
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ListingId {
        self.id
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    /// Type code of this listing: 'P' for purchase, 'S' for sale.
    pub fn kind_code(&self) -> char {
        self.kind.code()
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn negotiable(&self) -> bool {
        self.negotiable
    }

    pub fn featured(&self) -> bool {
        self.featured
    }

    pub fn highlight_until(&self) -> Option<DateTime<Utc>> {
        self.highlight_until
    }

    pub fn views(&self) -> u64 {
        self.views
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_open(&self) -> bool {
        self.created && matches!(self.status, ListingStatus::Open)
    }

    /// Best pending proposal: highest amount, earliest submission on ties.
    pub fn best_proposal(&self) -> Option<&PendingProposal> {
        self.proposals.peek_best()
    }

    pub fn pending_count(&self) -> usize {
        self.proposals.len()
    }

    /// Pending proposals, best first.
    pub fn pending_sorted(&self) -> Vec<PendingProposal> {
        self.proposals.sorted()
    }

    /// Case-insensitive text match over title and description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }

    /// Weak listing equality: two listings are considered the same
    /// advertisement when their titles match exactly (case-sensitive).
    pub fn title_equals(&self, other: &Listing) -> bool {
        self.title == other.title
    }
}

impl AggregateRoot for Listing {
    type Id = ListingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenListing {
    pub listing_id: ListingId,
    pub kind: ListingKind,
    pub owner: UserId,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub price: Money,
    pub negotiable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeTitle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTitle {
    pub listing_id: ListingId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeDescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescription {
    pub listing_id: ListingId,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeCategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCategory {
    pub listing_id: ListingId,
    pub category: Category,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePrice {
    pub listing_id: ListingId,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetNegotiable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNegotiable {
    pub listing_id: ListingId,
    pub negotiable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordView.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FeatureListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureListing {
    pub listing_id: ListingId,
    pub until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExtendHighlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendHighlight {
    pub listing_id: ListingId,
    pub days: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitProposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitProposal {
    pub listing_id: ListingId,
    pub proposer: UserId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptBestProposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptBestProposal {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefuseBestProposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefuseBestProposal {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawListing {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingCommand {
    OpenListing(OpenListing),
    ChangeTitle(ChangeTitle),
    ChangeDescription(ChangeDescription),
    ChangeCategory(ChangeCategory),
    ChangePrice(ChangePrice),
    SetNegotiable(SetNegotiable),
    RecordView(RecordView),
    FeatureListing(FeatureListing),
    ExtendHighlight(ExtendHighlight),
    SubmitProposal(SubmitProposal),
    AcceptBestProposal(AcceptBestProposal),
    RefuseBestProposal(RefuseBestProposal),
    WithdrawListing(WithdrawListing),
}

/// Event: ListingOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingOpened {
    pub listing_id: ListingId,
    pub kind: ListingKind,
    pub owner: UserId,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub price: Money,
    pub negotiable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TitleChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleChanged {
    pub listing_id: ListingId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DescriptionChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionChanged {
    pub listing_id: ListingId,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChanged {
    pub listing_id: ListingId,
    pub category: Category,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub listing_id: ListingId,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: NegotiableSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiableSet {
    pub listing_id: ListingId,
    pub negotiable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingViewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingViewed {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingFeatured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFeatured {
    pub listing_id: ListingId,
    pub until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HighlightExtended.
///
/// Carries the resulting end date so read models never redo the date math.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightExtended {
    pub listing_id: ListingId,
    pub days: u32,
    pub until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProposalSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSubmitted {
    pub listing_id: ListingId,
    pub seq: u64,
    pub proposer: UserId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProposalAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAccepted {
    pub listing_id: ListingId,
    pub seq: u64,
    pub proposer: UserId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProposalRefused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRefused {
    pub listing_id: ListingId,
    pub seq: u64,
    pub proposer: UserId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingWithdrawn.
///
/// Carries the owner so reference tracking never has to look the listing up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingWithdrawn {
    pub listing_id: ListingId,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingEvent {
    ListingOpened(ListingOpened),
    TitleChanged(TitleChanged),
    DescriptionChanged(DescriptionChanged),
    CategoryChanged(CategoryChanged),
    PriceChanged(PriceChanged),
    NegotiableSet(NegotiableSet),
    ListingViewed(ListingViewed),
    ListingFeatured(ListingFeatured),
    HighlightExtended(HighlightExtended),
    ProposalSubmitted(ProposalSubmitted),
    ProposalAccepted(ProposalAccepted),
    ProposalRefused(ProposalRefused),
    ListingWithdrawn(ListingWithdrawn),
}

impl ListingEvent {
    /// Identifier of the listing this event belongs to.
    pub fn listing_id(&self) -> ListingId {
        match self {
            ListingEvent::ListingOpened(e) => e.listing_id,
            ListingEvent::TitleChanged(e) => e.listing_id,
            ListingEvent::DescriptionChanged(e) => e.listing_id,
            ListingEvent::CategoryChanged(e) => e.listing_id,
            ListingEvent::PriceChanged(e) => e.listing_id,
            ListingEvent::NegotiableSet(e) => e.listing_id,
            ListingEvent::ListingViewed(e) => e.listing_id,
            ListingEvent::ListingFeatured(e) => e.listing_id,
            ListingEvent::HighlightExtended(e) => e.listing_id,
            ListingEvent::ProposalSubmitted(e) => e.listing_id,
            ListingEvent::ProposalAccepted(e) => e.listing_id,
            ListingEvent::ProposalRefused(e) => e.listing_id,
            ListingEvent::ListingWithdrawn(e) => e.listing_id,
        }
    }
}

impl Event for ListingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ListingEvent::ListingOpened(_) => "listings.listing.opened",
            ListingEvent::TitleChanged(_) => "listings.listing.title_changed",
            ListingEvent::DescriptionChanged(_) => "listings.listing.description_changed",
            ListingEvent::CategoryChanged(_) => "listings.listing.category_changed",
            ListingEvent::PriceChanged(_) => "listings.listing.price_changed",
            ListingEvent::NegotiableSet(_) => "listings.listing.negotiable_set",
            ListingEvent::ListingViewed(_) => "listings.listing.viewed",
            ListingEvent::ListingFeatured(_) => "listings.listing.featured",
            ListingEvent::HighlightExtended(_) => "listings.listing.highlight_extended",
            ListingEvent::ProposalSubmitted(_) => "listings.listing.proposal_submitted",
            ListingEvent::ProposalAccepted(_) => "listings.listing.proposal_accepted",
            ListingEvent::ProposalRefused(_) => "listings.listing.proposal_refused",
            ListingEvent::ListingWithdrawn(_) => "listings.listing.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ListingEvent::ListingOpened(e) => e.occurred_at,
            ListingEvent::TitleChanged(e) => e.occurred_at,
            ListingEvent::DescriptionChanged(e) => e.occurred_at,
            ListingEvent::CategoryChanged(e) => e.occurred_at,
            ListingEvent::PriceChanged(e) => e.occurred_at,
            ListingEvent::NegotiableSet(e) => e.occurred_at,
            ListingEvent::ListingViewed(e) => e.occurred_at,
            ListingEvent::ListingFeatured(e) => e.occurred_at,
            ListingEvent::HighlightExtended(e) => e.occurred_at,
            ListingEvent::ProposalSubmitted(e) => e.occurred_at,
            ListingEvent::ProposalAccepted(e) => e.occurred_at,
            ListingEvent::ProposalRefused(e) => e.occurred_at,
            ListingEvent::ListingWithdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Listing {
    type Command = ListingCommand;
    type Event = ListingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ListingEvent::ListingOpened(e) => {
                self.id = e.listing_id;
                self.kind = e.kind;
                self.owner = Some(e.owner);
                self.title = e.title.clone();
                self.category = e.category;
                self.description = e.description.clone();
                self.price = e.price;
                self.negotiable = e.negotiable;
                self.featured = false;
                self.highlight_until = None;
                self.views = 0;
                self.status = ListingStatus::Open;
                self.proposals = ProposalBook::new();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ListingEvent::TitleChanged(e) => {
                self.title = e.title.clone();
            }
            ListingEvent::DescriptionChanged(e) => {
                self.description = e.description.clone();
            }
            ListingEvent::CategoryChanged(e) => {
                self.category = e.category;
            }
            ListingEvent::PriceChanged(e) => {
                self.price = e.price;
            }
            ListingEvent::NegotiableSet(e) => {
                self.negotiable = e.negotiable;
            }
            ListingEvent::ListingViewed(_) => {
                self.views += 1;
            }
            ListingEvent::ListingFeatured(e) => {
                self.featured = true;
                self.highlight_until = Some(e.until);
            }
            ListingEvent::HighlightExtended(e) => {
                self.highlight_until = Some(e.until);
            }
            ListingEvent::ProposalSubmitted(e) => {
                self.proposals.push(PendingProposal {
                    seq: e.seq,
                    proposer: e.proposer,
                    amount: e.amount,
                    offered_at: e.occurred_at,
                });
            }
            ListingEvent::ProposalAccepted(_) => {
                self.proposals.pop_best();
            }
            ListingEvent::ProposalRefused(_) => {
                self.proposals.pop_best();
            }
            ListingEvent::ListingWithdrawn(_) => {
                self.status = ListingStatus::Withdrawn;
            }
        }

        // One version bump per applied event; replay lands on the same count.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ListingCommand::OpenListing(cmd) => self.handle_open(cmd),
            ListingCommand::ChangeTitle(cmd) => self.handle_change_title(cmd),
            ListingCommand::ChangeDescription(cmd) => self.handle_change_description(cmd),
            ListingCommand::ChangeCategory(cmd) => self.handle_change_category(cmd),
            ListingCommand::ChangePrice(cmd) => self.handle_change_price(cmd),
            ListingCommand::SetNegotiable(cmd) => self.handle_set_negotiable(cmd),
            ListingCommand::RecordView(cmd) => self.handle_record_view(cmd),
            ListingCommand::FeatureListing(cmd) => self.handle_feature(cmd),
            ListingCommand::ExtendHighlight(cmd) => self.handle_extend_highlight(cmd),
            ListingCommand::SubmitProposal(cmd) => self.handle_submit_proposal(cmd),
            ListingCommand::AcceptBestProposal(cmd) => self.handle_accept_best(cmd),
            ListingCommand::RefuseBestProposal(cmd) => self.handle_refuse_best(cmd),
            ListingCommand::WithdrawListing(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl Listing {
    fn ensure_listing_id(&self, listing_id: ListingId) -> Result<(), DomainError> {
        if self.id != listing_id {
            return Err(DomainError::invariant("listing_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant("only open listings can be edited"));
        }
        Ok(())
    }

    fn ensure_reviewable(&self) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant(
                "proposals can only be reviewed on open listings",
            ));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenListing) -> Result<Vec<ListingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("listing already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.price.is_negative() {
            return Err(DomainError::validation("asking price cannot be negative"));
        }

        Ok(vec![ListingEvent::ListingOpened(ListingOpened {
            listing_id: cmd.listing_id,
            kind: cmd.kind,
            owner: cmd.owner,
            title: cmd.title.clone(),
            category: cmd.category,
            description: cmd.description.clone(),
            price: cmd.price,
            negotiable: cmd.negotiable,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_title(&self, cmd: &ChangeTitle) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_editable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }

        Ok(vec![ListingEvent::TitleChanged(TitleChanged {
            listing_id: cmd.listing_id,
            title: cmd.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_description(
        &self,
        cmd: &ChangeDescription,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_editable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        Ok(vec![ListingEvent::DescriptionChanged(DescriptionChanged {
            listing_id: cmd.listing_id,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_category(
        &self,
        cmd: &ChangeCategory,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_editable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        Ok(vec![ListingEvent::CategoryChanged(CategoryChanged {
            listing_id: cmd.listing_id,
            category: cmd.category,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangePrice) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_editable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if cmd.price.is_negative() {
            return Err(DomainError::validation("asking price cannot be negative"));
        }

        Ok(vec![ListingEvent::PriceChanged(PriceChanged {
            listing_id: cmd.listing_id,
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_negotiable(
        &self,
        cmd: &SetNegotiable,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_editable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        Ok(vec![ListingEvent::NegotiableSet(NegotiableSet {
            listing_id: cmd.listing_id,
            negotiable: cmd.negotiable,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_view(&self, cmd: &RecordView) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if matches!(self.status, ListingStatus::Withdrawn) {
            return Err(DomainError::invariant("withdrawn listings cannot be viewed"));
        }

        Ok(vec![ListingEvent::ListingViewed(ListingViewed {
            listing_id: cmd.listing_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_feature(&self, cmd: &FeatureListing) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant("only open listings can be featured"));
        }
        if cmd.until <= cmd.occurred_at {
            return Err(DomainError::validation(
                "highlight end must be after the feature time",
            ));
        }

        Ok(vec![ListingEvent::ListingFeatured(ListingFeatured {
            listing_id: cmd.listing_id,
            until: cmd.until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_extend_highlight(
        &self,
        cmd: &ExtendHighlight,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant(
                "only open listings can have their highlight extended",
            ));
        }
        if cmd.days == 0 {
            return Err(DomainError::validation("extension must be at least one day"));
        }
        let Some(current) = self.highlight_until else {
            return Err(DomainError::invariant(
                "only featured listings can have their highlight extended",
            ));
        };

        let until = current
            .checked_add_signed(Duration::days(i64::from(cmd.days)))
            .ok_or_else(|| {
                DomainError::validation("highlight extension overflows the supported date range")
            })?;

        Ok(vec![ListingEvent::HighlightExtended(HighlightExtended {
            listing_id: cmd.listing_id,
            days: cmd.days,
            until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit_proposal(
        &self,
        cmd: &SubmitProposal,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant(
                "proposals can only be submitted to open listings",
            ));
        }
        if self.owner == Some(cmd.proposer) {
            return Err(DomainError::validation(
                "owner cannot bid on their own listing",
            ));
        }

        Ok(vec![ListingEvent::ProposalSubmitted(ProposalSubmitted {
            listing_id: cmd.listing_id,
            seq: self.proposals.next_seq(),
            proposer: cmd.proposer,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept_best(
        &self,
        cmd: &AcceptBestProposal,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_reviewable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        let best = self
            .proposals
            .peek_best()
            .ok_or_else(|| DomainError::invariant("no pending proposals to review"))?;

        // The listing stays open: the remaining proposals are retained for a
        // future review, not auto-refused.
        Ok(vec![ListingEvent::ProposalAccepted(ProposalAccepted {
            listing_id: cmd.listing_id,
            seq: best.seq,
            proposer: best.proposer,
            amount: best.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refuse_best(
        &self,
        cmd: &RefuseBestProposal,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_reviewable()?;
        self.ensure_listing_id(cmd.listing_id)?;

        let best = self
            .proposals
            .peek_best()
            .ok_or_else(|| DomainError::invariant("no pending proposals to review"))?;

        Ok(vec![ListingEvent::ProposalRefused(ProposalRefused {
            listing_id: cmd.listing_id,
            seq: best.seq,
            proposer: best.proposer,
            amount: best.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawListing) -> Result<Vec<ListingEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_listing_id(cmd.listing_id)?;

        if !matches!(self.status, ListingStatus::Open) {
            return Err(DomainError::invariant(
                "only open listings can be withdrawn",
            ));
        }

        let owner = self
            .owner
            .ok_or_else(|| DomainError::invariant("listing has no owner"))?;

        // Every pending proposal is refused on the way out so no proposer
        // stays referenced by a closed listing.
        let mut events: Vec<ListingEvent> = self
            .proposals
            .sorted()
            .into_iter()
            .map(|p| {
                ListingEvent::ProposalRefused(ProposalRefused {
                    listing_id: cmd.listing_id,
                    seq: p.seq,
                    proposer: p.proposer,
                    amount: p.amount,
                    occurred_at: cmd.occurred_at,
                })
            })
            .collect();

        events.push(ListingEvent::ListingWithdrawn(ListingWithdrawn {
            listing_id: cmd.listing_id,
            owner,
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }
}

impl Listing {
    /// Export this listing as a self-contained snapshot.
    pub fn snapshot(&self) -> Result<ListingSnapshot, DomainError> {
        self.ensure_exists()?;
        let owner = self
            .owner
            .ok_or_else(|| DomainError::invariant("listing has no owner"))?;
        let created_at = self
            .created_at
            .ok_or_else(|| DomainError::invariant("listing has no creation time"))?;

        Ok(ListingSnapshot {
            id: self.id.value(),
            kind: self.kind,
            owner,
            title: self.title.clone(),
            category: self.category,
            description: self.description.clone(),
            price: self.price,
            negotiable: self.negotiable,
            featured: self.featured,
            highlight_until: self.highlight_until,
            views: self.views,
            status: self.status,
            created_at,
            proposals: self.proposals.sorted(),
        })
    }

    /// Rebuild a listing from an imported snapshot.
    ///
    /// Claims the embedded identifier so the local counter never reissues
    /// it. The result is a standalone value: it does not resume the
    /// exporter's event stream, so its version restarts at zero.
    pub fn from_snapshot(snapshot: ListingSnapshot) -> Result<Self, DomainError> {
        snapshot.validate()?;
        ListingId::claim_at_least(snapshot.id.saturating_add(1));

        Ok(Self {
            id: ListingId::from(snapshot.id),
            kind: snapshot.kind,
            owner: Some(snapshot.owner),
            title: snapshot.title,
            category: snapshot.category,
            description: snapshot.description,
            price: snapshot.price,
            negotiable: snapshot.negotiable,
            featured: snapshot.featured,
            highlight_until: snapshot.highlight_until,
            views: snapshot.views,
            status: snapshot.status,
            proposals: ProposalBook::from(snapshot.proposals),
            created_at: Some(snapshot.created_at),
            version: 0,
            created: true,
        })
    }
}
