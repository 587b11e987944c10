//! `adboard` - demo binary for the classified-ads marketplace.
//!
//! Seeds a small marketplace (`--seed-demo`), then walks the owner through
//! reviewing the proposals on their listing: interactively on stdin/stdout,
//! or scripted with `--script accept refuse back` for non-interactive runs.

use std::io;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use adboard_core::{ListingId, Money, UserId};
use adboard_listings::{Category, ListingKind};
use adboard_market::review::{FixedPrompt, MenuPrompt, ReviewDecision, ReviewOutcome, ReviewPrompt};
use adboard_market::service::MarketService;

/// Classified-ads marketplace demo
#[derive(Parser)]
#[command(name = "adboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Use JSON log output
    #[arg(long)]
    json_logs: bool,

    /// Review decisions to apply instead of prompting on stdin
    #[arg(long, value_enum, num_args = 1..)]
    script: Option<Vec<ScriptedDecision>>,

    /// Seed the demo marketplace before reviewing
    #[arg(long)]
    seed_demo: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScriptedDecision {
    Accept,
    Refuse,
    Back,
}

impl From<ScriptedDecision> for ReviewDecision {
    fn from(value: ScriptedDecision) -> Self {
        match value {
            ScriptedDecision::Accept => ReviewDecision::Accept,
            ScriptedDecision::Refuse => ReviewDecision::Refuse,
            ScriptedDecision::Back => ReviewDecision::Back,
        }
    }
}

struct Demo {
    owner: UserId,
    listing: ListingId,
}

/// Registers the demo cast and opens a purchase listing with three
/// competing proposals (80, 120, 120).
fn seed_demo(market: &MarketService) -> Result<Demo> {
    let owner = market.register_user("Omar", "omar@example.com", "Lyon")?;
    let ana = market.register_user("Ana", "ana@example.com", "Paris")?;
    let bea = market.register_user("Bea", "bea@example.com", "Nice")?;
    let cleo = market.register_user("Cleo", "cleo@example.com", "Lille")?;

    let listing = market.open_listing(
        owner,
        ListingKind::Purchase,
        "Road bike",
        Category::Vehicles,
        "Mid-range road bike, any condition",
        Money::from_major(100),
        true,
    )?;

    market.record_view(listing)?;
    market.submit_proposal(listing, ana, Money::from_major(80))?;
    market.submit_proposal(listing, bea, Money::from_major(120))?;
    market.submit_proposal(listing, cleo, Money::from_major(120))?;

    Ok(Demo { owner, listing })
}

/// Runs review rounds until the owner backs out or the book drains.
fn run_reviews(
    market: &MarketService,
    listing: ListingId,
    prompt: &mut dyn ReviewPrompt,
) -> Result<()> {
    loop {
        match market
            .review_proposals(listing, prompt)
            .context("reviewing proposals")?
        {
            ReviewOutcome::Accepted { .. } | ReviewOutcome::Refused { .. } => continue,
            ReviewOutcome::Backed | ReviewOutcome::NoProposals => return Ok(()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        adboard_observability::init_json();
    } else {
        adboard_observability::init();
    }

    let market = MarketService::new();

    if !cli.seed_demo {
        info!("market is empty; rerun with --seed-demo to load the demo listing");
        return Ok(());
    }
    let demo = seed_demo(&market).context("seeding demo data")?;

    match &cli.script {
        Some(decisions) => {
            let mut prompt = FixedPrompt::new(decisions.iter().map(|d| ReviewDecision::from(*d)));
            run_reviews(&market, demo.listing, &mut prompt)?;
        }
        None => {
            let stdin = io::stdin();
            let mut prompt = MenuPrompt::new(stdin.lock(), io::stdout());
            run_reviews(&market, demo.listing, &mut prompt)?;
        }
    }

    let entry = market
        .listing(&demo.listing)
        .context("demo listing missing from the catalog")?;
    info!(
        listing = %demo.listing,
        pending = entry.pending_count(),
        trades = market.trade_history(&demo.owner).len(),
        "demo finished"
    );

    Ok(())
}
