//! Listings domain module (classified advertisements, event-sourced).
//!
//! A listing is a purchase request or a sale offer. Both variants share the
//! catalog contract (views, featuring, text search, snapshots) and the
//! negotiation flow: members submit competing monetary proposals, and the
//! owner reviews them best-first, accepting or refusing one at a time. The
//! variants differ only in their type code and in which side of a concluded
//! trade the owner lands on.
//!
//! Everything here is deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod category;
pub mod listing;
pub mod proposal;
pub mod snapshot;

pub use category::Category;
pub use listing::{
    AcceptBestProposal, CategoryChanged, ChangeCategory, ChangeDescription, ChangePrice,
    ChangeTitle, DescriptionChanged, ExtendHighlight, FeatureListing, HighlightExtended, Listing,
    ListingCommand, ListingEvent, ListingFeatured, ListingKind, ListingOpened, ListingStatus,
    ListingViewed, ListingWithdrawn, NegotiableSet, OpenListing, PriceChanged, ProposalAccepted,
    ProposalRefused, ProposalSubmitted, RecordView, RefuseBestProposal, SetNegotiable,
    SubmitProposal, TitleChanged, WithdrawListing,
};
pub use proposal::{PendingProposal, ProposalBook};
pub use snapshot::ListingSnapshot;
