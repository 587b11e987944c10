use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adboard_core::{Money, UserId};

/// A monetary proposal waiting for the listing owner's decision.
///
/// `seq` is the submission order within one listing, minted by the proposal
/// book and carried on the emitted event so replay reproduces it exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingProposal {
    pub seq: u64,
    pub proposer: UserId,
    pub amount: Money,
    pub offered_at: DateTime<Utc>,
}

// Ordering is what the heap sees: higher amount wins, and between equal
// amounts the earlier submission wins. Equality follows the same key so the
// Ord contract holds (seq is unique within a book).
impl PartialEq for PendingProposal {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount && self.seq == other.seq
    }
}

impl Eq for PendingProposal {}

impl PartialOrd for PendingProposal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingProposal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount
            .cmp(&other.amount)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-heap of pending proposals for one listing.
///
/// The best proposal is the highest amount; ties resolve to the earliest
/// submission. Serializes as a best-first list so snapshots stay canonical
/// regardless of internal heap layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<PendingProposal>", into = "Vec<PendingProposal>")]
pub struct ProposalBook {
    heap: BinaryHeap<PendingProposal>,
    next_seq: u64,
}

impl ProposalBook {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 1,
        }
    }

    /// The sequence number the next accepted submission will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn push(&mut self, proposal: PendingProposal) {
        self.next_seq = self.next_seq.max(proposal.seq + 1);
        self.heap.push(proposal);
    }

    pub fn peek_best(&self) -> Option<&PendingProposal> {
        self.heap.peek()
    }

    pub fn pop_best(&mut self) -> Option<PendingProposal> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// All pending proposals, best first.
    pub fn sorted(&self) -> Vec<PendingProposal> {
        let mut proposals = self.heap.clone().into_sorted_vec();
        proposals.reverse();
        proposals
    }
}

impl Default for ProposalBook {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ProposalBook {
    fn eq(&self, other: &Self) -> bool {
        self.next_seq == other.next_seq && self.sorted() == other.sorted()
    }
}

impl Eq for ProposalBook {}

impl From<ProposalBook> for Vec<PendingProposal> {
    fn from(book: ProposalBook) -> Self {
        book.sorted()
    }
}

impl From<Vec<PendingProposal>> for ProposalBook {
    fn from(proposals: Vec<PendingProposal>) -> Self {
        let mut book = ProposalBook::new();
        for proposal in proposals {
            book.push(proposal);
        }
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn proposal(seq: u64, cents: i64) -> PendingProposal {
        PendingProposal {
            seq,
            proposer: UserId::new(),
            amount: Money::from_cents(cents),
            offered_at: Utc::now(),
        }
    }

    #[test]
    fn best_is_highest_amount() {
        let mut book = ProposalBook::new();
        book.push(proposal(1, 8_000));
        book.push(proposal(2, 12_000));
        book.push(proposal(3, 9_500));

        let best = book.peek_best().unwrap();
        assert_eq!(best.amount, Money::from_cents(12_000));
        assert_eq!(best.seq, 2);
    }

    #[test]
    fn equal_amounts_resolve_to_earliest_submission() {
        let mut book = ProposalBook::new();
        book.push(proposal(1, 8_000));
        book.push(proposal(2, 12_000));
        book.push(proposal(3, 12_000));

        let first = book.pop_best().unwrap();
        assert_eq!(first.seq, 2);

        let second = book.pop_best().unwrap();
        assert_eq!(second.seq, 3);

        let third = book.pop_best().unwrap();
        assert_eq!(third.seq, 1);
        assert!(book.is_empty());
    }

    #[test]
    fn pop_removes_exactly_one_proposal() {
        let mut book = ProposalBook::new();
        book.push(proposal(1, 5_000));
        book.push(proposal(2, 7_000));

        assert_eq!(book.len(), 2);
        let popped = book.pop_best().unwrap();
        assert_eq!(popped.seq, 2);
        assert_eq!(book.len(), 1);
        assert_eq!(book.peek_best().unwrap().seq, 1);
    }

    #[test]
    fn push_advances_next_seq_past_replayed_entries() {
        let mut book = ProposalBook::new();
        assert_eq!(book.next_seq(), 1);

        book.push(proposal(1, 5_000));
        book.push(proposal(2, 7_000));
        assert_eq!(book.next_seq(), 3);

        // Replaying an old entry never rewinds the counter.
        let mut replayed = ProposalBook::new();
        replayed.push(proposal(7, 5_000));
        assert_eq!(replayed.next_seq(), 8);
        replayed.push(proposal(2, 9_000));
        assert_eq!(replayed.next_seq(), 8);
    }

    #[test]
    fn serializes_best_first_and_round_trips() {
        let mut book = ProposalBook::new();
        book.push(proposal(1, 8_000));
        book.push(proposal(2, 12_000));
        book.push(proposal(3, 12_000));

        let json = serde_json::to_value(&book).unwrap();
        let amounts: Vec<i64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["amount"].as_i64().unwrap())
            .collect();
        assert_eq!(amounts, vec![12_000, 12_000, 8_000]);

        let restored: ProposalBook = serde_json::from_value(json).unwrap();
        assert_eq!(restored, book);
        assert_eq!(restored.next_seq(), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: For any set of submitted amounts, the book's best
        /// proposal carries the maximum amount, and among proposals with that
        /// amount it carries the smallest sequence number.
        #[test]
        fn best_proposal_is_max_amount_earliest_seq(
            amounts in prop::collection::vec(0i64..1_000_000i64, 1..50)
        ) {
            let mut book = ProposalBook::new();
            for (i, cents) in amounts.iter().enumerate() {
                book.push(proposal(i as u64 + 1, *cents));
            }

            let best = book.peek_best().unwrap();
            let max = amounts.iter().copied().max().unwrap();
            prop_assert_eq!(best.amount, Money::from_cents(max));

            let earliest_at_max = amounts
                .iter()
                .position(|&c| c == max)
                .map(|i| i as u64 + 1)
                .unwrap();
            prop_assert_eq!(best.seq, earliest_at_max);
        }

        /// Property: Draining the book yields amounts in non-increasing
        /// order, with sequence numbers ascending within each amount.
        #[test]
        fn drain_order_is_amount_desc_then_fifo(
            amounts in prop::collection::vec(0i64..10i64, 1..50)
        ) {
            let mut book = ProposalBook::new();
            for (i, cents) in amounts.iter().enumerate() {
                book.push(proposal(i as u64 + 1, *cents));
            }

            let mut drained = Vec::new();
            while let Some(p) = book.pop_best() {
                drained.push(p);
            }

            prop_assert_eq!(drained.len(), amounts.len());
            for pair in drained.windows(2) {
                prop_assert!(pair[0].amount >= pair[1].amount);
                if pair[0].amount == pair[1].amount {
                    prop_assert!(pair[0].seq < pair[1].seq);
                }
            }
        }
    }
}
