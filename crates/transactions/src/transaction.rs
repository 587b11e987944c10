use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adboard_core::{Aggregate, AggregateRoot, DomainError, ListingId, Money, TransactionId, UserId};
use adboard_events::Event;
use adboard_listings::ListingKind;

/// Aggregate root: Transaction (one concluded trade).
///
/// The buyer/seller roles follow the listing variant: on a purchase listing
/// the owner buys and the proposer sells; on a sale listing the owner sells
/// and the proposer buys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: TransactionId,
    listing_id: Option<ListingId>,
    listing_kind: ListingKind,
    amount: Money,
    buyer: Option<UserId>,
    seller: Option<UserId>,
    recorded_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Transaction {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            listing_id: None,
            listing_kind: ListingKind::Purchase,
            amount: Money::zero(),
            buyer: None,
            seller: None,
            recorded_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.listing_id
    }

    pub fn listing_kind(&self) -> ListingKind {
        self.listing_kind
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn buyer(&self) -> Option<UserId> {
        self.buyer
    }

    pub fn seller(&self) -> Option<UserId> {
        self.seller
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.recorded_at
    }

    pub fn is_recorded(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
///
/// Carries the listing's owner and the winning proposer; the buyer/seller
/// split is derived from the listing variant when the event is minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction_id: TransactionId,
    pub listing_id: ListingId,
    pub listing_kind: ListingKind,
    pub amount: Money,
    pub owner: UserId,
    pub proposer: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    RecordTransaction(RecordTransaction),
}

/// Event: TransactionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub transaction_id: TransactionId,
    pub listing_id: ListingId,
    pub listing_kind: ListingKind,
    pub amount: Money,
    pub buyer: UserId,
    pub seller: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionRecorded(TransactionRecorded),
}

impl TransactionEvent {
    /// Identifier of the transaction this event belongs to.
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            TransactionEvent::TransactionRecorded(e) => e.transaction_id,
        }
    }
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionRecorded(_) => "transactions.transaction.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Transaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionRecorded(e) => {
                self.id = e.transaction_id;
                self.listing_id = Some(e.listing_id);
                self.listing_kind = e.listing_kind;
                self.amount = e.amount;
                self.buyer = Some(e.buyer);
                self.seller = Some(e.seller);
                self.recorded_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::RecordTransaction(cmd) => self.handle_record(cmd),
        }
    }
}

impl Transaction {
    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transaction already recorded"));
        }
        if cmd.owner == cmd.proposer {
            return Err(DomainError::validation(
                "buyer and seller must be different users",
            ));
        }

        let (buyer, seller) = match cmd.listing_kind {
            ListingKind::Purchase => (cmd.owner, cmd.proposer),
            ListingKind::Sale => (cmd.proposer, cmd.owner),
        };

        Ok(vec![TransactionEvent::TransactionRecorded(
            TransactionRecorded {
                transaction_id: cmd.transaction_id,
                listing_id: cmd.listing_id,
                listing_kind: cmd.listing_kind,
                amount: cmd.amount,
                buyer,
                seller,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
