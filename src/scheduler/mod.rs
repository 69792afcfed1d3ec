//! Per-cycle raid orchestration.
//!
//! One cycle, per village: fetch the troop inventory, gate the known targets
//! (due time, priority, pause, loss cooldown), order the eligible ones
//! nearest-first, prefilter bands by feasibility, then walk the candidates —
//! multiplier-adjusted composition, band promotion when the home band is
//! unaffordable, external re-validation, dispatch, bookkeeping, commitment.
//!
//! Nearest-first ordering is deliberate: closer targets have shorter
//! round-trip exposure and feed the learning loop faster.
//!
//! Every external failure inside the loop skips the affected target with a
//! `SkipReason` and continues; only an unreadable troop inventory aborts the
//! cycle, since nothing can be afforded against an unknown bank.

pub mod due;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{PageError, SkipNote, SkipReason};
use crate::hint::{self, NextDueHint};
use crate::ledger::{CommitmentLedger, CommitmentRecord, CommitmentSource};
use crate::outcome::OutcomeStore;
use crate::page::{PageClient, TargetValidator, VillageId};
use crate::plan::TroopPlan;
use crate::target::TargetKey;
use crate::units::Composition;

use due::Gate;

/// One known raidable location, with its precomputed distance from the
/// village. Supplied externally (scan data), never discovered here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateTarget {
    /// Canonical target identity.
    pub key: TargetKey,
    /// Distance from the village, map squares.
    pub distance: f64,
    /// Target kind, carried into the commitment for post-match side effects.
    pub source: CommitmentSource,
}

/// Everything the orchestrator needs to cycle one village.
#[derive(Debug, Clone)]
pub struct VillageContext {
    /// Village identity.
    pub id: VillageId,
    /// The village's own coordinates, for the hint document.
    pub coords: TargetKey,
    /// Distance-banded troop plan for this village.
    pub plan: TroopPlan,
    /// Known targets with precomputed distances.
    pub targets: Vec<CandidateTarget>,
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Targets successfully dispatched against, in dispatch order.
    pub dispatched: Vec<TargetKey>,
    /// Targets passed over, with reasons.
    pub skips: Vec<SkipNote>,
    /// True when the cycle stopped before exhausting candidates (no band
    /// affordable at all, or the skip cap fired).
    pub stopped_early: bool,
}

/// Decides, per cycle, which targets get raided with what.
pub struct Orchestrator {
    config: EngineConfig,
    outcomes: Arc<OutcomeStore>,
    ledger: Arc<CommitmentLedger>,
    page: Arc<dyn PageClient>,
    validator: Arc<dyn TargetValidator>,
    hint_path: Option<PathBuf>,
}

impl Orchestrator {
    /// Creates an orchestrator over the shared stores and external clients.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        outcomes: Arc<OutcomeStore>,
        ledger: Arc<CommitmentLedger>,
        page: Arc<dyn PageClient>,
        validator: Arc<dyn TargetValidator>,
    ) -> Self {
        Self {
            config,
            outcomes,
            ledger,
            page,
            validator,
            hint_path: None,
        }
    }

    /// Enables the advisory next-due hint document at `path`.
    #[must_use]
    pub fn with_hint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hint_path = Some(path.into());
        self
    }

    fn gate(&self) -> Gate {
        Gate {
            interval_sec: self.config.target_interval_sec,
            jitter_max_sec: self.config.interval_jitter_sec,
            cooldown_on_loss_sec: self.config.cooldown_on_loss_sec,
        }
    }

    /// Runs one cycle for `village` at `now_epoch`.
    ///
    /// # Errors
    ///
    /// Returns a `PageError` only when the troop inventory cannot be
    /// fetched; all later external failures are absorbed as skips.
    pub fn cycle(&self, village: &VillageContext, now_epoch: f64) -> Result<CycleReport, PageError> {
        let mut inventory = self.page.troop_inventory(village.id)?;
        let mut report = CycleReport::default();

        let mut eligible = self.eligible_candidates(village, now_epoch);
        eligible.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let satisfiable = self.satisfiable_bands(&village.plan, &inventory);
        if satisfiable.iter().all(|&ok| !ok) && !village.plan.is_empty() {
            debug!(village = %village.id, "no band satisfiable by current bank, ending cycle");
            report.stopped_early = true;
            self.write_hint(village, now_epoch);
            return Ok(report);
        }

        let ceiling = village.plan.max_distance();
        let mut consecutive_skips: u32 = 0;

        for candidate in eligible {
            if candidate.distance >= ceiling {
                // Candidates are distance-ordered; everything past the
                // ceiling has no band.
                break;
            }

            match self.try_dispatch(village, &candidate, &mut inventory, &satisfiable, now_epoch) {
                DispatchAttempt::Sent => {
                    consecutive_skips = 0;
                    report.dispatched.push(candidate.key);
                }
                DispatchAttempt::Skipped(reason) => {
                    let counts_toward_cap = reason == SkipReason::InsufficientTroops;
                    report.skips.push(SkipNote {
                        target: candidate.key,
                        reason,
                    });
                    if counts_toward_cap {
                        consecutive_skips += 1;
                        if consecutive_skips >= self.config.max_skips {
                            debug!(village = %village.id, "consecutive skip cap reached, ending cycle");
                            report.stopped_early = true;
                            break;
                        }
                    }
                }
            }
        }

        self.write_hint(village, now_epoch);
        info!(
            village = %village.id,
            dispatched = report.dispatched.len(),
            skipped = report.skips.len(),
            "orchestrator cycle complete"
        );
        Ok(report)
    }

    fn eligible_candidates(&self, village: &VillageContext, now: f64) -> Vec<CandidateTarget> {
        let gate = self.gate();
        village
            .targets
            .iter()
            .filter(|candidate| {
                let baseline = self.outcomes.baseline(candidate.key);
                due::eligibility(candidate.key, &baseline, gate, now).is_ok()
            })
            .copied()
            .collect()
    }

    /// Marks, per band, whether the current bank can cover the band's
    /// minimal functional composition. Bands failing this never warrant
    /// per-target probing.
    fn satisfiable_bands(&self, plan: &TroopPlan, inventory: &Composition) -> Vec<bool> {
        plan.bands()
            .iter()
            .map(|band| {
                band.adjusted_composition(0.0, self.config.min_base_group)
                    .covered_by(inventory)
            })
            .collect()
    }

    fn try_dispatch(
        &self,
        village: &VillageContext,
        candidate: &CandidateTarget,
        inventory: &mut Composition,
        satisfiable: &[bool],
        now: f64,
    ) -> DispatchAttempt {
        let Some((band_index, band)) = village.plan.band_for(candidate.distance) else {
            return DispatchAttempt::Skipped(SkipReason::NoBand);
        };

        let multiplier = self.outcomes.get(candidate.key).multiplier;

        let mut selected = None;
        if satisfiable.get(band_index).copied().unwrap_or(false) {
            let wanted = band.adjusted_composition(multiplier, self.config.min_base_group);
            if wanted.covered_by(inventory) {
                selected = Some((band, wanted));
            }
        }

        if selected.is_none() && self.config.promotion_enabled {
            if let Some((next_index, next_band)) =
                village.plan.promotion_candidate(band_index, candidate.distance)
            {
                if satisfiable.get(next_index).copied().unwrap_or(false) {
                    let wanted =
                        next_band.adjusted_composition(multiplier, self.config.min_base_group);
                    if wanted.covered_by(inventory) {
                        debug!(target = %candidate.key, "home band unaffordable, promoting to next band");
                        selected = Some((next_band, wanted));
                    }
                }
            }
        }

        let Some((band, composition)) = selected else {
            return DispatchAttempt::Skipped(SkipReason::InsufficientTroops);
        };

        match self.validator.is_raidable(candidate.key, candidate.distance) {
            Ok(verdict) if !verdict.raidable => {
                return DispatchAttempt::Skipped(SkipReason::ValidationRejected(
                    verdict.reason.unwrap_or_else(|| "unspecified".to_string()),
                ));
            }
            Ok(_) => {}
            Err(err) => {
                return DispatchAttempt::Skipped(SkipReason::PageFailure(err.to_string()));
            }
        }

        let outcome = match self.page.dispatch_raid(village.id, candidate.key, &composition) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(target = %candidate.key, error = %err, "dispatch failed, target stays due");
                return DispatchAttempt::Skipped(SkipReason::DispatchFailed(err.to_string()));
            }
        };
        if !outcome.accepted {
            return DispatchAttempt::Skipped(SkipReason::DispatchFailed(
                "rally point refused the raid".to_string(),
            ));
        }

        composition.deduct_from(inventory);
        self.outcomes.set_last_sent(candidate.key, Some(now));
        self.outcomes.clear_priority(candidate.key);

        let recommended = band
            .units
            .first()
            .map_or(0, |entry| entry.group_size);
        let record = CommitmentRecord::new(
            village.id,
            candidate.key,
            recommended,
            composition,
            now,
            outcome.travel_time_sec,
            candidate.source,
        );
        if let Err(err) = self.ledger.enqueue(record) {
            // The raid is already in flight; without a ledger entry it will
            // never reconcile, so this is loud.
            warn!(target = %candidate.key, error = %err, "raid sent but commitment could not be persisted");
        }

        DispatchAttempt::Sent
    }

    fn write_hint(&self, village: &VillageContext, now: f64) {
        let Some(path) = &self.hint_path else {
            return;
        };

        let gate = self.gate();
        let next_epoch = village
            .targets
            .iter()
            .map(|candidate| {
                let baseline = self.outcomes.baseline(candidate.key);
                due::next_due_epoch(candidate.key, &baseline, gate, now)
            })
            .min_by(f64::total_cmp);

        let hint = NextDueHint {
            village_id: village.id,
            village_coords: village.coords,
            generated_at: Utc::now(),
            next_due_in_sec: next_epoch.map(|epoch| (epoch - now).max(0.0)),
            next_due_epoch: next_epoch,
        };
        if let Err(err) = hint::write_hint(path, &hint) {
            warn!(path = %path.display(), error = %err, "next-due hint write failed");
        }
    }
}

enum DispatchAttempt {
    Sent,
    Skipped(SkipReason),
}
