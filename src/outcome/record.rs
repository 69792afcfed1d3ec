//! Per-target learning state.
//!
//! An `OutcomeRecord` accumulates everything the engine has learned about one
//! target: attempt counters, a bounded rolling history of recent attempts,
//! loot aggregates, the learned troop multiplier with its audit log, and the
//! scheduling markers (last sent, pause window, priority window).
//!
//! Two invariants hold after every mutation:
//! - `attempts == successes + failures`
//! - the multiplier stays inside its configured clamp bounds, and only ever
//!   moves through bounded multiplicative nudges.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::loot::Loot;

/// Outcome of a single resolved attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidResult {
    /// Troops came home (possibly with losses).
    Won,
    /// Nothing came home.
    Lost,
}

/// Direction of a multiplier nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    /// Grow the multiplier: `m *= 1 + step`.
    Up,
    /// Shrink the multiplier: `m *= 1 - step`.
    Down,
}

/// One resolved attempt, as kept in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    /// Epoch seconds at which the outcome was recorded.
    pub at_epoch: f64,
    /// Human-readable unit label of the dispatched composition.
    pub unit_label: String,
    /// Group size the plan recommended before adjustment.
    pub recommended: u32,
    /// Total troops actually sent.
    pub sent: u64,
    /// The observed result.
    pub result: RaidResult,
    /// Fraction of sent troops lost, when known.
    pub loss_pct: Option<f64>,
    /// Total loot brought home.
    pub loot_total: u64,
}

/// One auditable multiplier change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierChange {
    /// When the change was applied.
    pub at: DateTime<Utc>,
    /// Multiplier before the nudge.
    pub old: f64,
    /// Multiplier after clamping.
    pub new: f64,
    /// Nudge direction.
    pub direction: NudgeDirection,
    /// Loss fraction that motivated the nudge, when one was observed.
    pub loss_pct: Option<f64>,
}

/// Inputs to recording one resolved attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Human-readable unit label of the dispatched composition.
    pub unit_label: String,
    /// Group size the plan recommended before adjustment.
    pub recommended: u32,
    /// Total troops actually sent.
    pub sent: u64,
    /// The observed result.
    pub result: RaidResult,
    /// Fraction of sent troops lost, when known.
    pub loss_pct: Option<f64>,
    /// Loot brought home, when known.
    pub loot: Option<Loot>,
}

/// Everything learned about one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Learned troop multiplier, clamped to the configured bounds.
    pub multiplier: f64,
    /// Total resolved attempts.
    pub attempts: u64,
    /// Attempts that came home.
    pub successes: u64,
    /// Attempts that were lost entirely.
    pub failures: u64,
    /// Most recent result.
    #[serde(default)]
    pub last_result: Option<RaidResult>,
    /// Epoch seconds of the most recent resolved attempt.
    #[serde(default)]
    pub last_timestamp: Option<f64>,
    /// Loss fraction of the most recent attempt, when known.
    #[serde(default)]
    pub last_loss_pct: Option<f64>,
    /// Mean loss fraction over history entries that carry a numeric loss.
    #[serde(default)]
    pub avg_loss_pct: Option<f64>,
    /// Bounded history of recent attempts, oldest evicted first.
    #[serde(default)]
    pub rolling_history: VecDeque<AttemptSnapshot>,
    /// Cumulative loot across all attempts.
    #[serde(default)]
    pub total_loot: Loot,
    /// Epoch of the most recent dispatch; absence means never sent.
    #[serde(default)]
    pub last_sent_epoch: Option<f64>,
    /// Target excluded from scheduling until this epoch.
    #[serde(default)]
    pub pause_until: Option<f64>,
    /// Target bypasses due-time gating until this epoch.
    #[serde(default)]
    pub priority_until: Option<f64>,
    /// Bounded audit log of multiplier changes, oldest evicted first.
    #[serde(default)]
    pub multiplier_log: VecDeque<MultiplierChange>,
}

impl Default for OutcomeRecord {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            attempts: 0,
            successes: 0,
            failures: 0,
            last_result: None,
            last_timestamp: None,
            last_loss_pct: None,
            avg_loss_pct: None,
            rolling_history: VecDeque::new(),
            total_loot: Loot::new(),
            last_sent_epoch: None,
            pause_until: None,
            priority_until: None,
            multiplier_log: VecDeque::new(),
        }
    }
}

impl OutcomeRecord {
    /// Records one resolved attempt at `now_epoch`.
    ///
    /// Updates counters, the rolling history (capped at `history_cap`),
    /// the derived `avg_loss_pct`, and the loot aggregate.
    pub fn record_attempt(&mut self, now_epoch: f64, attempt: Attempt, history_cap: usize) {
        self.attempts += 1;
        match attempt.result {
            RaidResult::Won => self.successes += 1,
            RaidResult::Lost => self.failures += 1,
        }

        let loss_pct = attempt.loss_pct.map(|pct| pct.clamp(0.0, 1.0));
        self.last_result = Some(attempt.result);
        self.last_timestamp = Some(now_epoch);
        self.last_loss_pct = loss_pct;

        let loot_total = attempt.loot.as_ref().map_or(0, Loot::total);
        if let Some(loot) = &attempt.loot {
            self.total_loot.absorb(loot);
        }

        self.rolling_history.push_back(AttemptSnapshot {
            at_epoch: now_epoch,
            unit_label: attempt.unit_label,
            recommended: attempt.recommended,
            sent: attempt.sent,
            result: attempt.result,
            loss_pct,
            loot_total,
        });
        while self.rolling_history.len() > history_cap.max(1) {
            self.rolling_history.pop_front();
        }

        self.recompute_avg_loss();
    }

    /// Applies one bounded multiplicative nudge, returning the new value.
    pub fn nudge_multiplier(
        &mut self,
        direction: NudgeDirection,
        step: f64,
        min: f64,
        max: f64,
        loss_pct: Option<f64>,
        log_cap: usize,
    ) -> f64 {
        let old = self.multiplier;
        let factor = match direction {
            NudgeDirection::Up => 1.0 + step,
            NudgeDirection::Down => (1.0 - step).max(0.0),
        };
        self.multiplier = (old * factor).clamp(min, max);

        self.multiplier_log.push_back(MultiplierChange {
            at: Utc::now(),
            old,
            new: self.multiplier,
            direction,
            loss_pct,
        });
        while self.multiplier_log.len() > log_cap.max(1) {
            self.multiplier_log.pop_front();
        }

        self.multiplier
    }

    fn recompute_avg_loss(&mut self) {
        let losses: Vec<f64> = self
            .rolling_history
            .iter()
            .filter_map(|snapshot| snapshot.loss_pct)
            .collect();
        self.avg_loss_pct = if losses.is_empty() {
            None
        } else {
            Some(losses.iter().sum::<f64>() / losses.len() as f64)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::Resource;

    fn won(loss_pct: Option<f64>) -> Attempt {
        Attempt {
            unit_label: "t1".to_string(),
            recommended: 20,
            sent: 20,
            result: RaidResult::Won,
            loss_pct,
            loot: None,
        }
    }

    #[test]
    fn attempt_accounting_holds() {
        let mut record = OutcomeRecord::default();
        for i in 0..7u64 {
            let mut attempt = won(None);
            if i % 3 == 0 {
                attempt.result = RaidResult::Lost;
                attempt.loss_pct = Some(1.0);
            }
            record.record_attempt(1000.0 + i as f64, attempt, 20);
        }
        assert_eq!(record.attempts, 7);
        assert_eq!(record.successes + record.failures, 7);
    }

    #[test]
    fn history_is_bounded_and_drops_oldest() {
        let mut record = OutcomeRecord::default();
        for i in 0..10u64 {
            record.record_attempt(f64::from(i as u32), won(None), 4);
        }
        assert_eq!(record.rolling_history.len(), 4);
        assert!((record.rolling_history.front().unwrap().at_epoch - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn avg_loss_ignores_entries_without_loss() {
        let mut record = OutcomeRecord::default();
        record.record_attempt(1.0, won(Some(0.2)), 20);
        record.record_attempt(2.0, won(None), 20);
        record.record_attempt(3.0, won(Some(0.4)), 20);
        let avg = record.avg_loss_pct.unwrap();
        assert!((avg - 0.3).abs() < 1e-9);
    }

    #[test]
    fn multiplier_stays_bounded_under_any_nudge_sequence() {
        let mut record = OutcomeRecord::default();
        for i in 0..100 {
            let direction = if i % 2 == 0 {
                NudgeDirection::Up
            } else {
                NudgeDirection::Down
            };
            let value = record.nudge_multiplier(direction, 1.0, 0.8, 2.5, None, 50);
            assert!((0.8..=2.5).contains(&value), "step {i}: {value}");
        }

        for _ in 0..20 {
            record.nudge_multiplier(NudgeDirection::Up, 0.25, 0.8, 2.5, None, 50);
        }
        assert!((record.multiplier - 2.5).abs() < f64::EPSILON);

        for _ in 0..50 {
            record.nudge_multiplier(NudgeDirection::Down, 0.25, 0.8, 2.5, None, 50);
        }
        assert!((record.multiplier - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn multiplier_log_is_audited_and_bounded() {
        let mut record = OutcomeRecord::default();
        for _ in 0..10 {
            record.nudge_multiplier(NudgeDirection::Up, 0.25, 0.8, 2.5, Some(0.0), 3);
        }
        assert_eq!(record.multiplier_log.len(), 3);
        let last = record.multiplier_log.back().unwrap();
        assert_eq!(last.direction, NudgeDirection::Up);
        assert!(last.new >= last.old || (last.new - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn loot_accumulates() {
        let mut record = OutcomeRecord::default();
        let haul: Loot = [(Resource::Wood, 120), (Resource::Clay, 80)].into_iter().collect();
        let mut attempt = won(None);
        attempt.loot = Some(haul.clone());
        record.record_attempt(1.0, attempt.clone(), 20);
        record.record_attempt(2.0, attempt, 20);
        assert_eq!(record.total_loot.amount(Resource::Wood), 240);
        assert_eq!(record.total_loot.total(), 400);
    }

    #[test]
    fn serde_round_trip_is_identical() {
        let mut record = OutcomeRecord::default();
        record.record_attempt(1000.0, won(Some(0.1)), 20);
        record.nudge_multiplier(NudgeDirection::Up, 0.25, 0.8, 2.5, Some(0.1), 50);
        record.last_sent_epoch = Some(1234.5);
        record.pause_until = Some(2000.0);

        let json = serde_json::to_string(&record).unwrap();
        let back: OutcomeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
