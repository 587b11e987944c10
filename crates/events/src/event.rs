use chrono::{DateTime, Utc};

/// A fact that happened in the marketplace.
///
/// Events are immutable once emitted, carry a schema version for future
/// evolution, and only ever accumulate: streams are append-only.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type identifier, namespaced by module
    /// (e.g. "listings.listing.proposal_accepted").
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time: when the fact occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
