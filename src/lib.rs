//! # raidcore — adaptive raid scheduling and outcome learning
//!
//! raidcore automates repeated, resource-yielding raids against map targets
//! in a persistent browser-based strategy game, adapting composition and
//! timing to outcomes observed after the fact. Three cooperating parts:
//!
//! - **Outcome store**: durable per-target statistics — attempt counters, a
//!   learned troop multiplier with an audit log, loot aggregates, pause and
//!   priority windows.
//! - **Commitment ledger + reconciler**: every dispatched raid becomes a
//!   pending commitment; the reconciler matches commitments against the
//!   village's returns feed, scores the outcome, and applies the multiplier
//!   policy. Unmatched commitments time out as full losses.
//! - **Orchestrator**: per cycle, decides which targets are due, picks a
//!   distance-band composition scaled by the learned multiplier (promoting
//!   to the next band when the home band is unaffordable), re-validates,
//!   dispatches, and records the commitment.
//!
//! Scraping, sessions, and credentials live behind the [`page::PageClient`]
//! and [`page::TargetValidator`] traits; the engine never touches game HTML.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use raidcore::{
//!     CommitmentLedger, EngineConfig, EngineRuntime, Orchestrator,
//!     OutcomeStore, Reconciler, RuntimeConfig,
//! };
//!
//! let config = EngineConfig::default().validate()?;
//! let outcomes = Arc::new(OutcomeStore::open("outcomes.json", &config));
//! let ledger = Arc::new(CommitmentLedger::open("ledger.json"));
//!
//! let orchestrator = Orchestrator::new(
//!     config.clone(), outcomes.clone(), ledger.clone(), page.clone(), validator,
//! );
//! let reconciler = Reconciler::new(config, outcomes, ledger, page);
//! let runtime = EngineRuntime::start(orchestrator, reconciler, villages, RuntimeConfig::default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hint;
pub mod ledger;
pub mod loot;
pub mod outcome;
pub mod page;
pub mod persist;
pub mod plan;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod target;
pub mod units;

// Re-export primary types at crate root for convenience
pub use config::EngineConfig;
pub use error::{ConfigError, LedgerError, PageError, SkipNote, SkipReason, StoreError};
pub use hint::NextDueHint;
pub use ledger::{CommitmentLedger, CommitmentRecord, CommitmentSource};
pub use loot::{Loot, Resource};
pub use outcome::{
    Attempt, BaselineSnapshot, MultiplierChange, NudgeDirection, OutcomeRecord, OutcomeStore,
    RaidResult,
};
pub use page::{
    DispatchOutcome, PageClient, RaidableVerdict, ReturnObservation, ReturnsFeed, TargetValidator,
    TileInfo, VillageId,
};
pub use plan::{BandUnit, DistanceBand, TroopPlan};
pub use reconcile::{PassReport, Reconciler};
pub use runtime::{EngineRuntime, RuntimeConfig};
pub use scheduler::{CandidateTarget, CycleReport, Orchestrator, VillageContext};
pub use target::TargetKey;
pub use units::{Composition, Faction, UnitRef};
