//! External interfaces consumed by the engine.
//!
//! The engine never touches game HTML or sessions itself; it talks to the
//! world through these traits. `PageClient` wraps the scraping/session layer
//! as a black box producing structured records, and `TargetValidator` is the
//! defense-in-depth check run immediately before committing troops. Both are
//! object-safe so the orchestrator and reconciler can hold `Arc<dyn ...>`.
//!
//! Implementations may be arbitrarily slow: humanized pacing and rate limits
//! live behind these traits, and callers must tolerate long blocking calls.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PageError;
use crate::loot::Loot;
use crate::target::TargetKey;
use crate::units::Composition;

/// Identity of a player village the engine operates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VillageId(pub u64);

impl fmt::Display for VillageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "village:{}", self.0)
    }
}

/// Best-effort snapshot of a map tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    /// Whether any player occupies the tile.
    pub occupied: bool,
    /// Whether the occupant is friendly (own account, ally, or NAP).
    pub friendly: bool,
    /// Tile title as shown on the map page.
    pub title: String,
    /// Defending animals/troops, when the page exposes them.
    pub defenders: Option<Composition>,
    /// Rough defensive power estimate, when computable.
    pub power_estimate: Option<f64>,
}

/// Result of a raid dispatch attempt that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Whether the rally point accepted the raid.
    pub accepted: bool,
    /// One-way travel time reported by the confirmation page, when present.
    pub travel_time_sec: Option<f64>,
}

/// One entry of a village's returns feed (rally point / report listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    /// Origin target of the returning force, when the listing names it.
    pub target: Option<TargetKey>,
    /// Epoch seconds at which the force arrives (or arrived) home.
    pub arrival_epoch: f64,
    /// Returning troop composition. `None` means the listing row was present
    /// but its troop counts could not be extracted; such entries never match
    /// and never score.
    pub returned: Option<Composition>,
    /// Loot carried home.
    pub loot: Loot,
    /// True when cargo capacity was reached (more could have been looted).
    pub carry_full: bool,
}

impl ReturnObservation {
    /// Total returning troops, when the counts are usable.
    #[must_use]
    pub fn returned_total(&self) -> Option<u64> {
        self.returned.as_ref().map(Composition::total)
    }
}

/// A village's returns feed as observed at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsFeed {
    /// Server clock at fetch time, epoch seconds.
    pub server_epoch: f64,
    /// Feed entries, newest-first or oldest-first as the page produced them.
    pub entries: Vec<ReturnObservation>,
}

/// Verdict of the pre-dispatch target validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidableVerdict {
    /// Whether the target may be raided right now.
    pub raidable: bool,
    /// Machine-readable reason code when not raidable.
    pub reason: Option<String>,
}

/// Black-box scraping/session layer.
pub trait PageClient: Send + Sync {
    /// Fetches a best-effort snapshot of the tile at `target`.
    fn tile_info(&self, target: TargetKey) -> Result<TileInfo, PageError>;

    /// Fetches the village's current troop inventory.
    fn troop_inventory(&self, village: VillageId) -> Result<Composition, PageError>;

    /// Sends a raid. An `Ok` with `accepted == false` means the server
    /// refused the raid (e.g. troops no longer present); an `Err` means the
    /// attempt never completed.
    fn dispatch_raid(
        &self,
        village: VillageId,
        target: TargetKey,
        composition: &Composition,
    ) -> Result<DispatchOutcome, PageError>;

    /// Fetches the village's current returns feed.
    fn returns_feed(&self, village: VillageId) -> Result<ReturnsFeed, PageError>;
}

/// Pre-dispatch target re-validation against fresh page data.
pub trait TargetValidator: Send + Sync {
    /// Decides whether `target` at `distance` is still a legitimate raid
    /// target (unoccupied, defenses acceptable, not on an exclusion list).
    fn is_raidable(&self, target: TargetKey, distance: f64) -> Result<RaidableVerdict, PageError>;
}
