use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use adboard_core::{StreamId, UserId};
use adboard_events::EventEnvelope;
use adboard_users::{TradeSide, UserEvent};

use crate::projections::{CursorCheck, Projection, ProjectionError, StreamCursors};
use crate::read_model::KeyValueStore;

/// Queryable user read model: the member directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCard {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub city: String,
    pub bought: u64,
    pub sold: u64,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl UserCard {
    pub fn total_trades(&self) -> u64 {
        self.bought + self.sold
    }
}

/// User directory projection.
///
/// Consumes user envelopes and maintains the directory read model behind
/// member lookup and the activity leaderboard.
#[derive(Debug)]
pub struct DirectoryProjection<S>
where
    S: KeyValueStore<UserId, UserCard>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> DirectoryProjection<S>
where
    S: KeyValueStore<UserId, UserCard>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Query one user.
    pub fn get(&self, user_id: &UserId) -> Option<UserCard> {
        self.store.get(user_id)
    }

    /// All known users, ordered by name.
    pub fn list(&self) -> Vec<UserCard> {
        let mut cards = self.store.list();
        cards.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.user_id.cmp(&b.user_id)));
        cards
    }

    /// Users still registered.
    pub fn active_users(&self) -> Vec<UserCard> {
        self.list().into_iter().filter(|c| c.active).collect()
    }

    /// The `n` most active members by total trades, name ascending on ties.
    ///
    /// Considers active users only.
    pub fn most_active(&self, n: usize) -> Vec<UserCard> {
        let mut cards = self.active_users();
        cards.sort_by(|a, b| {
            b.total_trades()
                .cmp(&a.total_trades())
                .then_with(|| a.name.cmp(&b.name))
        });
        cards.truncate(n);
        cards
    }

    /// Rebuild the read model from scratch by replaying envelopes.
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

    // Streams register before they mutate; strays for unknown users are ignored.
    fn update(&self, id: UserId, f: impl FnOnce(&mut UserCard)) {
        if let Some(mut card) = self.store.get(&id) {
            f(&mut card);
            self.store.upsert(id, card);
        }
    }
}

impl<S> Projection for DirectoryProjection<S>
where
    S: KeyValueStore<UserId, UserCard>,
{
    fn name(&self) -> &str {
        "market.directory"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.stream_kind() != "users.user" {
            return Ok(());
        }

        let seq = envelope.sequence_number();
        if let CursorCheck::Skip = self.cursors.check(envelope.stream(), seq)? {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if StreamId::User(event.user_id()) != envelope.stream() {
            return Err(ProjectionError::StreamMismatch(
                "event user_id does not match envelope stream".to_string(),
            ));
        }

        match event {
            UserEvent::UserRegistered(e) => {
                self.store.upsert(
                    e.user_id,
                    UserCard {
                        user_id: e.user_id,
                        name: e.name,
                        email: e.email,
                        city: e.city,
                        bought: 0,
                        sold: 0,
                        last_trade_at: None,
                        active: true,
                    },
                );
            }
            UserEvent::UserRenamed(e) => {
                self.update(e.user_id, |card| card.name = e.name);
            }
            UserEvent::UserContactChanged(e) => {
                self.update(e.user_id, |card| card.email = e.email);
            }
            UserEvent::UserRelocated(e) => {
                self.update(e.user_id, |card| card.city = e.city);
            }
            UserEvent::UserTradeRecorded(e) => {
                self.update(e.user_id, |card| {
                    match e.side {
                        TradeSide::Bought => card.bought += 1,
                        TradeSide::Sold => card.sold += 1,
                    }
                    card.last_trade_at = Some(e.occurred_at);
                });
            }
            UserEvent::UserDeregistered(e) => {
                self.update(e.user_id, |card| card.active = false);
            }
        }

        self.cursors.advance(envelope.stream(), seq);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use uuid::Uuid;

    use adboard_core::TransactionId;
    use adboard_events::Event;
    use adboard_users::{UserRegistered, UserTradeRecorded};

    use crate::read_model::InMemoryKeyValueStore;

    fn make_envelope(user_id: UserId, seq: u64, event: UserEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            StreamId::User(user_id),
            seq,
            event.event_type(),
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn registered(user_id: UserId, name: &str) -> UserEvent {
        UserEvent::UserRegistered(UserRegistered {
            user_id,
            name: name.to_string(),
            email: format!("{}@example.test", name.to_lowercase()),
            city: "Lyon".to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn traded(user_id: UserId, side: TradeSide) -> UserEvent {
        UserEvent::UserTradeRecorded(UserTradeRecorded {
            user_id,
            side,
            transaction_id: TransactionId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn new_projection() -> DirectoryProjection<Arc<InMemoryKeyValueStore<UserId, UserCard>>> {
        DirectoryProjection::new(Arc::new(InMemoryKeyValueStore::new()))
    }

    #[test]
    fn most_active_orders_by_trades_then_name() {
        let proj = new_projection();
        let (ana, bea, cleo) = (UserId::new(), UserId::new(), UserId::new());

        proj.apply_envelope(&make_envelope(ana, 1, registered(ana, "Ana"))).unwrap();
        proj.apply_envelope(&make_envelope(bea, 1, registered(bea, "Bea"))).unwrap();
        proj.apply_envelope(&make_envelope(cleo, 1, registered(cleo, "Cleo"))).unwrap();

        proj.apply_envelope(&make_envelope(cleo, 2, traded(cleo, TradeSide::Sold))).unwrap();
        proj.apply_envelope(&make_envelope(cleo, 3, traded(cleo, TradeSide::Bought))).unwrap();
        proj.apply_envelope(&make_envelope(bea, 2, traded(bea, TradeSide::Bought))).unwrap();
        proj.apply_envelope(&make_envelope(ana, 2, traded(ana, TradeSide::Sold))).unwrap();

        let names: Vec<_> = proj.most_active(3).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Cleo", "Ana", "Bea"]);
    }

    #[test]
    fn trade_sides_land_on_the_right_counter() {
        let proj = new_projection();
        let user = UserId::new();

        proj.apply_envelope(&make_envelope(user, 1, registered(user, "Dov"))).unwrap();
        proj.apply_envelope(&make_envelope(user, 2, traded(user, TradeSide::Bought))).unwrap();
        proj.apply_envelope(&make_envelope(user, 3, traded(user, TradeSide::Bought))).unwrap();
        proj.apply_envelope(&make_envelope(user, 4, traded(user, TradeSide::Sold))).unwrap();

        let card = proj.get(&user).unwrap();
        assert_eq!(card.bought, 2);
        assert_eq!(card.sold, 1);
        assert!(card.last_trade_at.is_some());
    }
}
