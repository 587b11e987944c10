//! Interactive proposal review.
//!
//! Negotiation is a conversation with the listing owner: show the best
//! pending proposal, ask for a verdict, act on it. The conversation side
//! lives behind [`ReviewPrompt`] so the service logic stays testable and the
//! CLI can swap the real menu for a scripted one.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use adboard_core::{Money, UserId};

use crate::projections::trades::TradeRecord;

/// The owner's verdict on the best pending proposal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Refuse,
    Back,
}

/// What a review round actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The book was empty; the owner was told so.
    NoProposals,
    /// Best proposal accepted; a transaction was recorded.
    Accepted { transaction: TradeRecord },
    /// Best proposal refused and removed.
    Refused {
        seq: u64,
        proposer: UserId,
        amount: Money,
    },
    /// The owner backed out; nothing changed.
    Backed,
}

/// Asks the listing owner what to do with the best pending proposal.
pub trait ReviewPrompt {
    /// Tell the owner there is nothing to review.
    fn report_no_proposals(&mut self);

    /// Present the best proposal and collect a verdict.
    fn choose(&mut self, amount: Money, proposer: &str) -> ReviewDecision;
}

/// Terminal menu prompt over any `BufRead`/`Write` pair.
///
/// Renders the offer and a numbered menu, then re-prompts until the input
/// parses to one of the options. End of input counts as backing out.
pub struct MenuPrompt<R, W> {
    input: R,
    output: W,
}

impl<R, W> MenuPrompt<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R, W> ReviewPrompt for MenuPrompt<R, W>
where
    R: BufRead,
    W: Write,
{
    fn report_no_proposals(&mut self) {
        let _ = writeln!(self.output, "You have not received any proposals.");
    }

    fn choose(&mut self, amount: Money, proposer: &str) -> ReviewDecision {
        let _ = writeln!(self.output, "Price offered: {amount}");
        let _ = writeln!(self.output, "Offer from: {proposer}");
        let _ = writeln!(self.output, "1 - Accept");
        let _ = writeln!(self.output, "2 - Refuse");
        let _ = writeln!(self.output, "3 - Back");

        loop {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return ReviewDecision::Back,
                Ok(_) => {}
            }

            match line.trim() {
                "1" => return ReviewDecision::Accept,
                "2" => return ReviewDecision::Refuse,
                "3" => return ReviewDecision::Back,
                _ => {
                    let _ = writeln!(self.output, "Please select a valid option");
                }
            }
        }
    }
}

/// Scripted prompt for tests and non-interactive runs.
///
/// Returns decisions from a fixed script, backing out once it runs dry, and
/// records what it was shown.
#[derive(Debug, Default)]
pub struct FixedPrompt {
    script: VecDeque<ReviewDecision>,
    /// Every (amount, proposer) pair presented, in order.
    pub seen: Vec<(Money, String)>,
    /// How many times the empty-book message was reported.
    pub no_proposal_reports: usize,
}

impl FixedPrompt {
    pub fn new(script: impl IntoIterator<Item = ReviewDecision>) -> Self {
        Self {
            script: script.into_iter().collect(),
            seen: Vec::new(),
            no_proposal_reports: 0,
        }
    }
}

impl ReviewPrompt for FixedPrompt {
    fn report_no_proposals(&mut self) {
        self.no_proposal_reports += 1;
    }

    fn choose(&mut self, amount: Money, proposer: &str) -> ReviewDecision {
        self.seen.push((amount, proposer.to_string()));
        self.script.pop_front().unwrap_or(ReviewDecision::Back)
    }
}
