//! Reconciliation of pending commitments against observed returns.
//!
//! Each pass loads the full commitment ledger, fetches every involved
//! village's returns feed at most once, matches commitments against feed
//! entries (see [`matcher`]), scores matched outcomes into the outcome
//! store, applies the multiplier policy, times out stale commitments, and
//! rewrites the ledger with whatever is still pending.
//!
//! Between the orchestrator's dispatch and this loop's next pass there is no
//! ordering guarantee; "sent" and "learned" converge eventually, bounded by
//! the return timeout.

pub mod matcher;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::ledger::{CommitmentLedger, CommitmentRecord, CommitmentSource};
use crate::error::LedgerError;
use crate::outcome::{Attempt, NudgeDirection, OutcomeStore, RaidResult};
use crate::page::{PageClient, ReturnObservation, VillageId};
use crate::units::Composition;

/// Counters describing one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Commitments matched against a feed entry.
    pub matched: usize,
    /// Commitments recorded as lost after timing out unobserved.
    pub timed_out: usize,
    /// Commitments left pending for the next pass.
    pub pending: usize,
    /// Full-loot immediate retries suppressed by a friendly-occupied tile.
    pub suppressed_retries: usize,
}

/// Classified outcome of one matched return.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MatchedOutcome {
    /// Troops came home; `loss_pct` of the sent total did not.
    Won { loss_pct: f64, carry_full: bool },
    /// Nothing came home.
    Lost,
}

fn classify(sent_total: u64, returned_total: u64, carry_full: bool) -> MatchedOutcome {
    if returned_total == 0 {
        return MatchedOutcome::Lost;
    }
    let loss_pct =
        (1.0 - returned_total as f64 / sent_total.max(1) as f64).clamp(0.0, 1.0);
    MatchedOutcome::Won { loss_pct, carry_full }
}

fn unit_label(sent_units: &Composition) -> String {
    sent_units
        .iter()
        .next()
        .map_or_else(|| "mixed".to_string(), |(unit, _)| unit.slot_label())
}

/// Matches pending commitments to observed returns and feeds the outcome
/// store.
pub struct Reconciler {
    config: EngineConfig,
    outcomes: Arc<OutcomeStore>,
    ledger: Arc<CommitmentLedger>,
    page: Arc<dyn PageClient>,
}

impl Reconciler {
    /// Creates a reconciler over the shared stores and page client.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        outcomes: Arc<OutcomeStore>,
        ledger: Arc<CommitmentLedger>,
        page: Arc<dyn PageClient>,
    ) -> Self {
        Self {
            config,
            outcomes,
            ledger,
            page,
        }
    }

    /// Runs one reconciliation pass at `now_epoch`.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` only when the ledger itself cannot be read or
    /// rewritten; feed failures are non-fatal and leave the affected
    /// village's commitments pending.
    pub fn pass(&self, now_epoch: f64) -> Result<PassReport, LedgerError> {
        let pending = self.ledger.load_all()?;
        if pending.is_empty() {
            return Ok(PassReport::default());
        }

        // Fetch each distinct village's feed at most once per pass. A failed
        // fetch leaves that village's commitments untouched: without the
        // feed we cannot distinguish "not yet returned" from "returned while
        // we were not looking", so even timeouts wait for a readable feed.
        let mut feeds: BTreeMap<VillageId, Option<FeedView>> = BTreeMap::new();
        for record in &pending {
            feeds.entry(record.village_id).or_insert_with(|| {
                match self.page.returns_feed(record.village_id) {
                    Ok(feed) => Some(FeedView::new(feed.entries)),
                    Err(err) => {
                        warn!(village = %record.village_id, error = %err, "returns feed unavailable, keeping commitments pending");
                        None
                    }
                }
            });
        }

        let mut report = PassReport::default();
        let mut survivors = Vec::new();

        for record in pending {
            let Some(Some(feed)) = feeds.get_mut(&record.village_id) else {
                survivors.push(record);
                continue;
            };

            if let Some(index) = matcher::find_match(
                &record,
                &feed.entries,
                &feed.consumed,
                self.config.match_tolerance_sec,
            ) {
                feed.consumed[index] = true;
                let entry = feed.entries[index].clone();
                self.apply_match(&record, &entry, now_epoch, &mut report);
                report.matched += 1;
                continue;
            }

            if now_epoch
                >= record.timeout_deadline(
                    self.config.return_timeout_sec,
                    self.config.max_commitment_age_sec,
                )
            {
                self.apply_timeout(&record, now_epoch);
                report.timed_out += 1;
                continue;
            }

            survivors.push(record);
        }

        report.pending = survivors.len();
        self.ledger.save_all(&survivors)?;

        info!(
            matched = report.matched,
            timed_out = report.timed_out,
            pending = report.pending,
            "reconciliation pass complete"
        );
        Ok(report)
    }

    fn apply_match(
        &self,
        record: &CommitmentRecord,
        entry: &ReturnObservation,
        now_epoch: f64,
        report: &mut PassReport,
    ) {
        // The matcher only returns entries with usable troop counts.
        let returned_total = entry.returned_total().unwrap_or(0);
        let outcome = classify(record.sent_total, returned_total, entry.carry_full);

        let (result, loss_pct) = match outcome {
            MatchedOutcome::Won { loss_pct, .. } => (RaidResult::Won, Some(loss_pct)),
            MatchedOutcome::Lost => (RaidResult::Lost, Some(1.0)),
        };

        self.outcomes.record_attempt(
            record.target,
            now_epoch,
            Attempt {
                unit_label: unit_label(&record.sent_units),
                recommended: record.recommended_troops,
                sent: record.sent_total,
                result,
                loss_pct,
                loot: Some(entry.loot.clone()),
            },
        );

        match outcome {
            MatchedOutcome::Won { loss_pct, .. } if loss_pct > 0.0 => {
                // Any troop loss: hold the multiplier and cool the target
                // down before re-evaluating.
                self.outcomes.set_pause(
                    record.target,
                    now_epoch,
                    self.config.cooldown_on_loss_sec,
                );
                debug!(target = %record.target, loss_pct, "losses observed, target paused");
            }
            MatchedOutcome::Won { carry_full, .. } => {
                self.outcomes.clear_pause(record.target);
                if carry_full {
                    let new = self.outcomes.nudge_multiplier(
                        record.target,
                        NudgeDirection::Up,
                        self.config.step_full_loot,
                        Some(0.0),
                    );
                    debug!(target = %record.target, multiplier = new, "cargo at capacity, multiplier raised");
                }
            }
            MatchedOutcome::Lost => {
                self.outcomes.set_pause(
                    record.target,
                    now_epoch,
                    self.config.cooldown_on_loss_sec,
                );
            }
        }

        if entry.carry_full
            && record.source == CommitmentSource::Oasis
            && matches!(outcome, MatchedOutcome::Won { .. })
        {
            self.schedule_immediate_retry(record, now_epoch, report);
        }
    }

    /// Full-loot retry: make the target due right now and fast-track it —
    /// unless a fresh tile lookup says it has since been occupied by a
    /// friendly player. The lookup is best-effort; when it fails we retry
    /// anyway.
    fn schedule_immediate_retry(
        &self,
        record: &CommitmentRecord,
        now_epoch: f64,
        report: &mut PassReport,
    ) {
        match self.page.tile_info(record.target) {
            Ok(tile) if tile.occupied && tile.friendly => {
                report.suppressed_retries += 1;
                info!(target = %record.target, "immediate retry suppressed, tile now friendly-occupied");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(target = %record.target, error = %err, "tile lookup failed, retrying anyway");
            }
        }

        let backdate =
            now_epoch - (self.config.target_interval_sec + self.config.interval_jitter_sec);
        self.outcomes.set_last_sent(record.target, Some(backdate));
        self.outcomes.set_priority(
            record.target,
            now_epoch,
            self.config.priority_retry_window_sec,
        );
        info!(target = %record.target, "full cargo, target scheduled for immediate retry");
    }

    fn apply_timeout(&self, record: &CommitmentRecord, now_epoch: f64) {
        self.outcomes.record_attempt(
            record.target,
            now_epoch,
            Attempt {
                unit_label: unit_label(&record.sent_units),
                recommended: record.recommended_troops,
                sent: record.sent_total,
                result: RaidResult::Lost,
                loss_pct: Some(1.0),
                loot: None,
            },
        );
        let new = self.outcomes.nudge_multiplier(
            record.target,
            NudgeDirection::Up,
            self.config.step_lost,
            Some(1.0),
        );
        warn!(target = %record.target, multiplier = new, "commitment timed out unobserved, recorded as full loss");
    }
}

struct FeedView {
    entries: Vec<ReturnObservation>,
    consumed: Vec<bool>,
}

impl FeedView {
    fn new(entries: Vec<ReturnObservation>) -> Self {
        let consumed = vec![false; entries.len()];
        Self { entries, consumed }
    }
}
