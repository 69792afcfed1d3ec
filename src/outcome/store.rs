//! Durable per-target outcome store.
//!
//! One JSON document maps canonical target keys to `OutcomeRecord`s. Every
//! mutation rewrites the whole file via temp-write + atomic rename while the
//! write lock is held, so in-process access is fully serialized. There is no
//! cross-process exclusion: a second process mutating the same file races as
//! last-writer-wins. That is a known, accepted limitation.
//!
//! Accessors never fail. A missing or corrupt backing file degrades to an
//! empty store, and a persistence failure is logged and swallowed — the
//! in-memory value is still returned and updated, so one bad disk never
//! stalls the learning loop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::config::EngineConfig;
use crate::loot::Loot;
use crate::persist;
use crate::target::TargetKey;

use super::record::{Attempt, NudgeDirection, OutcomeRecord, RaidResult};

/// Read-only projection of a target's learning state, for display and
/// scheduling decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSnapshot {
    /// Learned multiplier.
    pub multiplier: f64,
    /// Total resolved attempts.
    pub attempts: u64,
    /// Attempts that came home.
    pub successes: u64,
    /// Attempts lost entirely.
    pub failures: u64,
    /// Most recent result.
    pub last_result: Option<RaidResult>,
    /// Epoch of the most recent resolved attempt.
    pub last_timestamp: Option<f64>,
    /// Mean loss over the rolling history.
    pub avg_loss_pct: Option<f64>,
    /// Cumulative loot.
    pub total_loot: Loot,
    /// Epoch of the most recent dispatch.
    pub last_sent_epoch: Option<f64>,
    /// Scheduling exclusion window end.
    pub pause_until: Option<f64>,
    /// Fast-track window end.
    pub priority_until: Option<f64>,
}

/// Durable map of `TargetKey → OutcomeRecord`.
pub struct OutcomeStore {
    path: PathBuf,
    min_multiplier: f64,
    max_multiplier: f64,
    history_cap: usize,
    change_log_cap: usize,
    records: RwLock<BTreeMap<TargetKey, OutcomeRecord>>,
}

impl OutcomeStore {
    /// Opens the store backed by `path`, loading any existing document.
    ///
    /// A missing file starts empty; a corrupt file is logged and also starts
    /// empty rather than failing.
    #[must_use]
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match persist::load_json::<BTreeMap<TargetKey, OutcomeRecord>>(&path) {
            Ok(Some(records)) => records,
            Ok(None) => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "outcome store unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            min_multiplier: config.min_multiplier,
            max_multiplier: config.max_multiplier,
            history_cap: config.history_cap,
            change_log_cap: config.change_log_cap,
            records: RwLock::new(records),
        }
    }

    /// The target's record, creating a default on first access.
    #[must_use]
    pub fn get(&self, key: TargetKey) -> OutcomeRecord {
        if let Some(record) = self.read().get(&key) {
            return record.clone();
        }
        OutcomeRecord::default()
    }

    /// Records one resolved attempt and persists.
    pub fn record_attempt(&self, key: TargetKey, now_epoch: f64, attempt: Attempt) {
        let mut records = self.write();
        records
            .entry(key)
            .or_default()
            .record_attempt(now_epoch, attempt, self.history_cap);
        self.persist(&records);
    }

    /// Applies one bounded multiplicative nudge and persists.
    ///
    /// Returns the new multiplier.
    pub fn nudge_multiplier(
        &self,
        key: TargetKey,
        direction: NudgeDirection,
        step: f64,
        loss_pct: Option<f64>,
    ) -> f64 {
        let mut records = self.write();
        let new = records.entry(key).or_default().nudge_multiplier(
            direction,
            step,
            self.min_multiplier,
            self.max_multiplier,
            loss_pct,
            self.change_log_cap,
        );
        self.persist(&records);
        new
    }

    /// Sets (or clears) the last-dispatch marker and persists.
    pub fn set_last_sent(&self, key: TargetKey, epoch: Option<f64>) {
        self.mutate(key, |record| record.last_sent_epoch = epoch);
    }

    /// Epoch of the most recent dispatch, if any.
    #[must_use]
    pub fn last_sent(&self, key: TargetKey) -> Option<f64> {
        self.read().get(&key).and_then(|record| record.last_sent_epoch)
    }

    /// Excludes the target from scheduling for `duration_sec` from `now`.
    pub fn set_pause(&self, key: TargetKey, now_epoch: f64, duration_sec: f64) {
        self.mutate(key, |record| record.pause_until = Some(now_epoch + duration_sec));
    }

    /// End of the exclusion window, if one is set.
    #[must_use]
    pub fn pause_until(&self, key: TargetKey) -> Option<f64> {
        self.read().get(&key).and_then(|record| record.pause_until)
    }

    /// Clears any exclusion window.
    pub fn clear_pause(&self, key: TargetKey) {
        self.mutate(key, |record| record.pause_until = None);
    }

    /// Fast-tracks the target for `duration_sec` from `now`.
    pub fn set_priority(&self, key: TargetKey, now_epoch: f64, duration_sec: f64) {
        self.mutate(key, |record| record.priority_until = Some(now_epoch + duration_sec));
    }

    /// End of the fast-track window, if one is set.
    #[must_use]
    pub fn priority_until(&self, key: TargetKey) -> Option<f64> {
        self.read().get(&key).and_then(|record| record.priority_until)
    }

    /// Clears any fast-track window.
    pub fn clear_priority(&self, key: TargetKey) {
        self.mutate(key, |record| record.priority_until = None);
    }

    /// Read-only projection of the target's state.
    #[must_use]
    pub fn baseline(&self, key: TargetKey) -> BaselineSnapshot {
        let record = self.get(key);
        BaselineSnapshot {
            multiplier: record.multiplier,
            attempts: record.attempts,
            successes: record.successes,
            failures: record.failures,
            last_result: record.last_result,
            last_timestamp: record.last_timestamp,
            avg_loss_pct: record.avg_loss_pct,
            total_loot: record.total_loot,
            last_sent_epoch: record.last_sent_epoch,
            pause_until: record.pause_until,
            priority_until: record.priority_until,
        }
    }

    fn mutate(&self, key: TargetKey, apply: impl FnOnce(&mut OutcomeRecord)) {
        let mut records = self.write();
        apply(records.entry(key).or_default());
        self.persist(&records);
    }

    fn persist(&self, records: &BTreeMap<TargetKey, OutcomeRecord>) {
        if let Err(err) = persist::atomic_write_json(&self.path, records) {
            warn!(path = %self.path.display(), error = %err, "outcome store persist failed, continuing in memory");
        }
    }

    // A poisoned lock means another accessor panicked mid-update; the data
    // itself is still structurally valid, so recover rather than propagate.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<TargetKey, OutcomeRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<TargetKey, OutcomeRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::Resource;

    fn store_in(dir: &tempfile::TempDir) -> OutcomeStore {
        OutcomeStore::open(dir.path().join("outcomes.json"), &EngineConfig::default())
    }

    fn attempt(result: RaidResult) -> Attempt {
        Attempt {
            unit_label: "t1".to_string(),
            recommended: 20,
            sent: 20,
            result,
            loss_pct: None,
            loot: Some([(Resource::Wood, 50)].into_iter().collect()),
        }
    }

    #[test]
    fn first_access_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = store.get(TargetKey::new(1, 1));
        assert_eq!(record.attempts, 0);
        assert!((record.multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = TargetKey::new(3, -4);

        {
            let store = store_in(&dir);
            store.record_attempt(key, 1000.0, attempt(RaidResult::Won));
            store.nudge_multiplier(key, NudgeDirection::Up, 0.25, None);
            store.set_last_sent(key, Some(999.0));
            store.set_pause(key, 1000.0, 3600.0);
        }

        let reopened = store_in(&dir);
        let record = reopened.get(key);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.successes, 1);
        assert!((record.multiplier - 1.25).abs() < 1e-9);
        assert_eq!(record.last_sent_epoch, Some(999.0));
        assert_eq!(record.pause_until, Some(4600.0));
        assert_eq!(record.total_loot.amount(Resource::Wood), 50);
        assert_eq!(record.multiplier_log.len(), 1);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.json");
        std::fs::write(&path, b"]]not json").unwrap();

        let store = OutcomeStore::open(&path, &EngineConfig::default());
        assert_eq!(store.get(TargetKey::new(0, 0)).attempts, 0);

        // And the store is writable again afterwards.
        store.record_attempt(TargetKey::new(0, 0), 1.0, attempt(RaidResult::Lost));
        assert_eq!(store.get(TargetKey::new(0, 0)).failures, 1);
    }

    #[test]
    fn pause_and_priority_windows_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = TargetKey::new(7, 7);

        store.set_priority(key, 500.0, 180.0);
        assert_eq!(store.priority_until(key), Some(680.0));
        store.clear_priority(key);
        assert_eq!(store.priority_until(key), None);

        store.set_pause(key, 500.0, 60.0);
        assert_eq!(store.pause_until(key), Some(560.0));
        store.clear_pause(key);
        assert_eq!(store.pause_until(key), None);
    }

    #[test]
    fn baseline_projects_record_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = TargetKey::new(2, 2);

        store.record_attempt(key, 100.0, attempt(RaidResult::Won));
        store.set_last_sent(key, Some(90.0));

        let baseline = store.baseline(key);
        assert_eq!(baseline.attempts, 1);
        assert_eq!(baseline.successes, 1);
        assert_eq!(baseline.last_sent_epoch, Some(90.0));
        assert_eq!(baseline.last_result, Some(RaidResult::Won));
    }
}
