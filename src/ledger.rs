//! Durable ledger of raids sent but not yet reconciled.
//!
//! The ledger is a flat JSON list rewritten wholesale via atomic replace.
//! A `CommitmentRecord` is created at dispatch time, lives in the ledger
//! while its outcome is pending, and is removed once the reconciler either
//! matches it against an observed return or times it out — no tombstones.
//!
//! In-process access is serialized through an internal mutex; as with the
//! outcome store there is no cross-process exclusion, which is a known,
//! accepted limitation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::page::VillageId;
use crate::persist;
use crate::target::TargetKey;
use crate::units::Composition;

/// What kind of target the commitment was sent against.
///
/// Governs post-match side effects: the full-loot immediate retry only
/// applies to oasis raids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentSource {
    /// An unoccupied oasis.
    Oasis,
    /// Anything else (farm list entry, abandoned village, ...).
    Other,
}

/// One "troops sent, outcome pending" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    /// Synthetic ledger id.
    pub id: Uuid,
    /// Village the raid departed from.
    pub village_id: VillageId,
    /// The raided target.
    pub target: TargetKey,
    /// Group size the plan recommended before adjustment.
    pub recommended_troops: u32,
    /// Total troops dispatched.
    pub sent_total: u64,
    /// Exact dispatched composition, for fallback matching.
    pub sent_units: Composition,
    /// Epoch seconds at dispatch.
    pub depart_epoch: f64,
    /// One-way travel time, when the confirmation page reported one.
    pub travel_time_sec: Option<f64>,
    /// `depart + 2 × travel_time`, when travel time is known.
    pub expected_return_epoch: Option<f64>,
    /// Target kind, for post-match side effects.
    pub source: CommitmentSource,
}

impl CommitmentRecord {
    /// Builds a new commitment at dispatch time, deriving the expected
    /// return epoch when a travel time is known.
    #[must_use]
    pub fn new(
        village_id: VillageId,
        target: TargetKey,
        recommended_troops: u32,
        sent_units: Composition,
        depart_epoch: f64,
        travel_time_sec: Option<f64>,
        source: CommitmentSource,
    ) -> Self {
        let expected_return_epoch = travel_time_sec.map(|travel| depart_epoch + 2.0 * travel);
        Self {
            id: Uuid::new_v4(),
            village_id,
            target,
            recommended_troops,
            sent_total: sent_units.total(),
            sent_units,
            depart_epoch,
            travel_time_sec,
            expected_return_epoch,
            source,
        }
    }

    /// The epoch past which this commitment counts as lost with no
    /// observation: expected return plus the return timeout, or — when no
    /// travel time was ever learned — departure plus the max commitment age.
    #[must_use]
    pub fn timeout_deadline(&self, return_timeout_sec: f64, max_age_sec: f64) -> f64 {
        match self.expected_return_epoch {
            Some(expected) => expected + return_timeout_sec,
            None => self.depart_epoch + max_age_sec,
        }
    }
}

/// Flat durable list of pending commitments.
pub struct CommitmentLedger {
    path: PathBuf,
    // Serializes load-modify-save sequences within this process.
    guard: Mutex<()>,
}

impl CommitmentLedger {
    /// Opens the ledger backed by `path`. The file is created lazily on the
    /// first save.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    /// Appends one commitment.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` when the backing file cannot be read or
    /// rewritten; the caller logs and retries on a later pass.
    pub fn enqueue(&self, record: CommitmentRecord) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut records = self.load_unlocked()?;
        records.push(record);
        self.save_unlocked(&records)
    }

    /// Loads every pending commitment. A missing file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` when the backing file exists but cannot be
    /// read or decoded.
    pub fn load_all(&self) -> Result<Vec<CommitmentRecord>, LedgerError> {
        let _guard = self.lock();
        self.load_unlocked()
    }

    /// Rewrites the ledger wholesale.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` when the atomic replace fails.
    pub fn save_all(&self, records: &[CommitmentRecord]) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.save_unlocked(records)
    }

    fn load_unlocked(&self) -> Result<Vec<CommitmentRecord>, LedgerError> {
        Ok(persist::load_json(&self.path)?.unwrap_or_default())
    }

    fn save_unlocked(&self, records: &[CommitmentRecord]) -> Result<(), LedgerError> {
        persist::atomic_write_json(&self.path, &records)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
