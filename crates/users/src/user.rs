use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adboard_core::{Aggregate, AggregateRoot, DomainError, TransactionId, UserId};
use adboard_events::Event;

/// User status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Deregistered,
}

/// Which side of a concluded trade a user was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Bought,
    Sold,
}

/// Aggregate root: User (a marketplace member).
///
/// Listings never own their users; they hold `UserId` handles into this
/// registry. The listings a user authored are a catalog query, not a stored
/// back-reference, so no reference cycle exists between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    city: String,
    bought: u64,
    sold: u64,
    last_trade_at: Option<DateTime<Utc>>,
    status: UserStatus,
    version: u64,
    created: bool,
}

impl User {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
            city: String::new(),
            bought: 0,
            sold: 0,
            last_trade_at: None,
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn bought(&self) -> u64 {
        self.bought
    }

    pub fn sold(&self) -> u64 {
        self.sold
    }

    pub fn trade_count(&self) -> u64 {
        self.bought + self.sold
    }

    pub fn last_trade_at(&self) -> Option<DateTime<Utc>> {
        self.last_trade_at
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    /// Invariant helper: whether this user may post listings or bid.
    ///
    /// Deregistered users cannot act in the marketplace.
    pub fn is_active(&self) -> bool {
        self.created && self.status == UserStatus::Active
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub city: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameUser {
    pub user_id: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContact {
    pub user_id: UserId,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Relocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocate {
    pub user_id: UserId,
    pub city: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTradeOutcome.
///
/// Issued once per party when a proposal is accepted: the concluded trade is
/// counted on the buyer's and the seller's entry alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTradeOutcome {
    pub user_id: UserId,
    pub side: TradeSide,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeregisterUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    RegisterUser(RegisterUser),
    RenameUser(RenameUser),
    ChangeContact(ChangeContact),
    Relocate(Relocate),
    RecordTradeOutcome(RecordTradeOutcome),
    DeregisterUser(DeregisterUser),
}

/// Event: UserRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub city: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRenamed {
    pub user_id: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserContactChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContactChanged {
    pub user_id: UserId,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserRelocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRelocated {
    pub user_id: UserId,
    pub city: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserTradeRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTradeRecorded {
    pub user_id: UserId,
    pub side: TradeSide,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserDeregistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeregistered {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    UserRegistered(UserRegistered),
    UserRenamed(UserRenamed),
    UserContactChanged(UserContactChanged),
    UserRelocated(UserRelocated),
    UserTradeRecorded(UserTradeRecorded),
    UserDeregistered(UserDeregistered),
}

impl UserEvent {
    /// Identifier of the user this event belongs to.
    pub fn user_id(&self) -> UserId {
        match self {
            UserEvent::UserRegistered(e) => e.user_id,
            UserEvent::UserRenamed(e) => e.user_id,
            UserEvent::UserContactChanged(e) => e.user_id,
            UserEvent::UserRelocated(e) => e.user_id,
            UserEvent::UserTradeRecorded(e) => e.user_id,
            UserEvent::UserDeregistered(e) => e.user_id,
        }
    }
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered(_) => "users.user.registered",
            UserEvent::UserRenamed(_) => "users.user.renamed",
            UserEvent::UserContactChanged(_) => "users.user.contact_changed",
            UserEvent::UserRelocated(_) => "users.user.relocated",
            UserEvent::UserTradeRecorded(_) => "users.user.trade_recorded",
            UserEvent::UserDeregistered(_) => "users.user.deregistered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserRegistered(e) => e.occurred_at,
            UserEvent::UserRenamed(e) => e.occurred_at,
            UserEvent::UserContactChanged(e) => e.occurred_at,
            UserEvent::UserRelocated(e) => e.occurred_at,
            UserEvent::UserTradeRecorded(e) => e.occurred_at,
            UserEvent::UserDeregistered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::UserRegistered(e) => {
                self.id = e.user_id;
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.city = e.city.clone();
                self.bought = 0;
                self.sold = 0;
                self.last_trade_at = None;
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::UserRenamed(e) => {
                self.name = e.name.clone();
            }
            UserEvent::UserContactChanged(e) => {
                self.email = e.email.clone();
            }
            UserEvent::UserRelocated(e) => {
                self.city = e.city.clone();
            }
            UserEvent::UserTradeRecorded(e) => {
                match e.side {
                    TradeSide::Bought => self.bought += 1,
                    TradeSide::Sold => self.sold += 1,
                }
                self.last_trade_at = Some(e.occurred_at);
            }
            UserEvent::UserDeregistered(_) => {
                self.status = UserStatus::Deregistered;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::RegisterUser(cmd) => self.handle_register(cmd),
            UserCommand::RenameUser(cmd) => self.handle_rename(cmd),
            UserCommand::ChangeContact(cmd) => self.handle_change_contact(cmd),
            UserCommand::Relocate(cmd) => self.handle_relocate(cmd),
            UserCommand::RecordTradeOutcome(cmd) => self.handle_record_trade(cmd),
            UserCommand::DeregisterUser(cmd) => self.handle_deregister(cmd),
        }
    }
}

impl User {
    fn ensure_user_id(&self, user_id: UserId) -> Result<(), DomainError> {
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.status == UserStatus::Deregistered {
            return Err(DomainError::invariant(
                "deregistered users cannot be modified",
            ));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.email.trim().is_empty() {
            return Err(DomainError::validation("email cannot be empty"));
        }
        if cmd.city.trim().is_empty() {
            return Err(DomainError::validation("city cannot be empty"));
        }

        Ok(vec![UserEvent::UserRegistered(UserRegistered {
            user_id: cmd.user_id,
            name: cmd.name.clone(),
            email: cmd.email.clone(),
            city: cmd.city.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_modifiable()?;
        self.ensure_user_id(cmd.user_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![UserEvent::UserRenamed(UserRenamed {
            user_id: cmd.user_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_contact(&self, cmd: &ChangeContact) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_modifiable()?;
        self.ensure_user_id(cmd.user_id)?;

        if cmd.email.trim().is_empty() {
            return Err(DomainError::validation("email cannot be empty"));
        }

        Ok(vec![UserEvent::UserContactChanged(UserContactChanged {
            user_id: cmd.user_id,
            email: cmd.email.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_relocate(&self, cmd: &Relocate) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_modifiable()?;
        self.ensure_user_id(cmd.user_id)?;

        if cmd.city.trim().is_empty() {
            return Err(DomainError::validation("city cannot be empty"));
        }

        Ok(vec![UserEvent::UserRelocated(UserRelocated {
            user_id: cmd.user_id,
            city: cmd.city.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_trade(
        &self,
        cmd: &RecordTradeOutcome,
    ) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_modifiable()?;
        self.ensure_user_id(cmd.user_id)?;

        Ok(vec![UserEvent::UserTradeRecorded(UserTradeRecorded {
            user_id: cmd.user_id,
            side: cmd.side,
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deregister(&self, cmd: &DeregisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_user_id(cmd.user_id)?;

        if self.status == UserStatus::Deregistered {
            return Err(DomainError::conflict("user is already deregistered"));
        }

        Ok(vec![UserEvent::UserDeregistered(UserDeregistered {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new()
    }

    fn test_transaction_id() -> TransactionId {
        TransactionId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_user(user_id: UserId) -> User {
        let mut user = User::empty(user_id);
        let cmd = RegisterUser {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        };
        let events = user.handle(&UserCommand::RegisterUser(cmd)).unwrap();
        user.apply(&events[0]);
        user
    }

    #[test]
    fn register_user_emits_user_registered_event() {
        let user_id = test_user_id();
        let user = User::empty(user_id);
        let cmd = RegisterUser {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        };

        let events = user.handle(&UserCommand::RegisterUser(cmd)).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            UserEvent::UserRegistered(e) => {
                assert_eq!(e.user_id, user_id);
                assert_eq!(e.name, "Ada");
                assert_eq!(e.email, "ada@example.com");
                assert_eq!(e.city, "Porto");
            }
            _ => panic!("Expected UserRegistered event"),
        }
    }

    #[test]
    fn register_user_rejects_empty_name() {
        let user = User::empty(test_user_id());
        let cmd = RegisterUser {
            user_id: test_user_id(),
            name: "   ".to_string(),
            email: "a@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        };

        let err = user.handle(&UserCommand::RegisterUser(cmd)).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn register_user_rejects_duplicate_registration() {
        let user_id = test_user_id();
        let user = registered_user(user_id);
        let cmd = RegisterUser {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        };

        let err = user.handle(&UserCommand::RegisterUser(cmd)).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate registration"),
        }
    }

    #[test]
    fn rename_updates_name() {
        let user_id = test_user_id();
        let mut user = registered_user(user_id);

        let cmd = RenameUser {
            user_id,
            name: "Ada L.".to_string(),
            occurred_at: test_time(),
        };
        let events = user.handle(&UserCommand::RenameUser(cmd)).unwrap();
        user.apply(&events[0]);

        assert_eq!(user.name(), "Ada L.");
    }

    #[test]
    fn trade_outcomes_bump_counters_per_side() {
        let user_id = test_user_id();
        let mut user = registered_user(user_id);
        assert_eq!(user.trade_count(), 0);
        assert!(user.last_trade_at().is_none());

        let bought = RecordTradeOutcome {
            user_id,
            side: TradeSide::Bought,
            transaction_id: test_transaction_id(),
            occurred_at: test_time(),
        };
        let events = user
            .handle(&UserCommand::RecordTradeOutcome(bought))
            .unwrap();
        user.apply(&events[0]);

        let sold = RecordTradeOutcome {
            user_id,
            side: TradeSide::Sold,
            transaction_id: test_transaction_id(),
            occurred_at: test_time(),
        };
        let events = user
            .handle(&UserCommand::RecordTradeOutcome(sold))
            .unwrap();
        user.apply(&events[0]);

        assert_eq!(user.bought(), 1);
        assert_eq!(user.sold(), 1);
        assert_eq!(user.trade_count(), 2);
        assert!(user.last_trade_at().is_some());
    }

    #[test]
    fn deregister_emits_event_and_blocks_further_commands() {
        let user_id = test_user_id();
        let mut user = registered_user(user_id);

        let cmd = DeregisterUser {
            user_id,
            occurred_at: test_time(),
        };
        let events = user.handle(&UserCommand::DeregisterUser(cmd)).unwrap();
        match &events[0] {
            UserEvent::UserDeregistered(e) => assert_eq!(e.user_id, user_id),
            _ => panic!("Expected UserDeregistered event"),
        }
        user.apply(&events[0]);
        assert_eq!(user.status(), UserStatus::Deregistered);
        assert!(!user.is_active());

        let rename = RenameUser {
            user_id,
            name: "Ghost".to_string(),
            occurred_at: test_time(),
        };
        let err = user.handle(&UserCommand::RenameUser(rename)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg)
                if msg.contains("deregistered users cannot be modified") => {}
            _ => panic!("Expected InvariantViolation for modifying deregistered user"),
        }
    }

    #[test]
    fn deregister_rejects_already_deregistered() {
        let user_id = test_user_id();
        let mut user = registered_user(user_id);

        let cmd = DeregisterUser {
            user_id,
            occurred_at: test_time(),
        };
        let events = user
            .handle(&UserCommand::DeregisterUser(cmd.clone()))
            .unwrap();
        user.apply(&events[0]);

        let err = user.handle(&UserCommand::DeregisterUser(cmd)).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for double deregistration"),
        }
    }

    #[test]
    fn commands_on_unregistered_user_are_not_found() {
        let user = User::empty(test_user_id());
        let cmd = RenameUser {
            user_id: test_user_id(),
            name: "Nobody".to_string(),
            occurred_at: test_time(),
        };

        let err = user.handle(&UserCommand::RenameUser(cmd)).unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound error for unregistered user"),
        }
    }

    #[test]
    fn version_increments_on_apply() {
        let user_id = test_user_id();
        let mut user = User::empty(user_id);
        assert_eq!(user.version(), 0);

        let register = RegisterUser {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        };
        let events = user.handle(&UserCommand::RegisterUser(register)).unwrap();
        user.apply(&events[0]);
        assert_eq!(user.version(), 1);

        let relocate = Relocate {
            user_id,
            city: "Braga".to_string(),
            occurred_at: test_time(),
        };
        let events = user.handle(&UserCommand::Relocate(relocate)).unwrap();
        user.apply(&events[0]);
        assert_eq!(user.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let user_id = test_user_id();
        let user = registered_user(user_id);
        let initial_version = user.version();
        let initial_name = user.name().to_string();

        let cmd = RenameUser {
            user_id,
            name: "Changed".to_string(),
            occurred_at: test_time(),
        };

        let events1 = user.handle(&UserCommand::RenameUser(cmd.clone())).unwrap();
        let events2 = user.handle(&UserCommand::RenameUser(cmd)).unwrap();

        assert_eq!(user.version(), initial_version);
        assert_eq!(user.name(), initial_name);
        assert_eq!(events1, events2);
    }

    #[test]
    fn apply_is_deterministic() {
        let user_id = test_user_id();
        let transaction_id = test_transaction_id();
        let event1 = UserEvent::UserRegistered(UserRegistered {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            city: "Porto".to_string(),
            occurred_at: test_time(),
        });
        let event2 = UserEvent::UserTradeRecorded(UserTradeRecorded {
            user_id,
            side: TradeSide::Sold,
            transaction_id,
            occurred_at: test_time(),
        });

        let mut user1 = User::empty(user_id);
        user1.apply(&event1);
        user1.apply(&event2);

        let mut user2 = User::empty(user_id);
        user2.apply(&event1);
        user2.apply(&event2);

        assert_eq!(user1, user2);
        assert_eq!(user1.sold(), 1);
        assert_eq!(user1.version(), 2);
    }
}
