//! Due-time arithmetic and eligibility gating.
//!
//! Pure functions over epoch seconds so every gating rule is testable
//! without a clock or a store.

use crate::outcome::{BaselineSnapshot, RaidResult};
use crate::target::TargetKey;

/// Deterministic per-target jitter in `[0, jitter_max_sec)`.
///
/// Derived from a `blake3` hash of the canonical key string rather than an
/// RNG, so a target's due times are reproducible across restarts and the
/// per-target offsets spread re-raids instead of bunching them.
#[must_use]
pub fn jitter_for(key: TargetKey, jitter_max_sec: f64) -> f64 {
    if jitter_max_sec <= 0.0 {
        return 0.0;
    }
    let hash = blake3::hash(key.to_string().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % 1000) as f64 / 1000.0 * jitter_max_sec
}

/// Seconds until the target is due. Non-positive means due now; a target
/// never sent is due immediately.
#[must_use]
pub fn due_seconds(last_sent: Option<f64>, interval_sec: f64, jitter_sec: f64, now: f64) -> f64 {
    match last_sent {
        Some(sent) => sent + interval_sec + jitter_sec - now,
        None => f64::NEG_INFINITY,
    }
}

/// Why a candidate is not eligible this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// `pause_until` is in the future — hard exclusion.
    Paused,
    /// Last result was a loss within the loss cooldown.
    LossCooldown,
    /// Not yet due and not fast-tracked.
    NotDue,
}

/// Gating inputs for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    /// Base re-raid interval.
    pub interval_sec: f64,
    /// Maximum deterministic jitter.
    pub jitter_max_sec: f64,
    /// Recent-loss exclusion window.
    pub cooldown_on_loss_sec: f64,
}

/// Applies the full eligibility rule set for one candidate at `now`.
///
/// Priority overrides due-time gating but never a pause or the loss
/// cooldown: those are hard exclusions.
pub fn eligibility(
    key: TargetKey,
    baseline: &BaselineSnapshot,
    gate: Gate,
    now: f64,
) -> Result<(), Ineligible> {
    if baseline.pause_until.is_some_and(|until| until > now) {
        return Err(Ineligible::Paused);
    }

    if baseline.last_result == Some(RaidResult::Lost) {
        if let Some(at) = baseline.last_timestamp {
            if now - at < gate.cooldown_on_loss_sec {
                return Err(Ineligible::LossCooldown);
            }
        }
    }

    if baseline.priority_until.is_some_and(|until| until > now) {
        return Ok(());
    }

    let jitter = jitter_for(key, gate.jitter_max_sec);
    if due_seconds(baseline.last_sent_epoch, gate.interval_sec, jitter, now) <= 0.0 {
        Ok(())
    } else {
        Err(Ineligible::NotDue)
    }
}

/// Absolute epoch at which the target next becomes due, for the hint
/// document. A paused target is not due before its pause lifts.
#[must_use]
pub fn next_due_epoch(key: TargetKey, baseline: &BaselineSnapshot, gate: Gate, now: f64) -> f64 {
    let base = if baseline.priority_until.is_some_and(|until| until > now) {
        now
    } else {
        match baseline.last_sent_epoch {
            Some(sent) => sent + gate.interval_sec + jitter_for(key, gate.jitter_max_sec),
            None => now,
        }
    };
    // A target already overdue is due right now, never in the past.
    base.max(baseline.pause_until.unwrap_or(f64::NEG_INFINITY)).max(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::Loot;

    fn baseline() -> BaselineSnapshot {
        BaselineSnapshot {
            multiplier: 1.0,
            attempts: 0,
            successes: 0,
            failures: 0,
            last_result: None,
            last_timestamp: None,
            avg_loss_pct: None,
            total_loot: Loot::new(),
            last_sent_epoch: None,
            pause_until: None,
            priority_until: None,
        }
    }

    fn gate() -> Gate {
        Gate {
            interval_sec: 600.0,
            jitter_max_sec: 0.0,
            cooldown_on_loss_sec: 3600.0,
        }
    }

    #[test]
    fn due_arithmetic_matches_interval() {
        // last_sent = T, interval = 600, jitter = 0.
        assert!(due_seconds(Some(1000.0), 600.0, 0.0, 1601.0) <= 0.0);
        assert!(due_seconds(Some(1000.0), 600.0, 0.0, 1599.0) > 0.0);
    }

    #[test]
    fn never_sent_is_due_immediately() {
        assert!(due_seconds(None, 600.0, 0.0, 0.0) <= 0.0);
    }

    #[test]
    fn eligibility_honours_due_gate() {
        let key = TargetKey::new(1, 1);
        let mut snapshot = baseline();
        snapshot.last_sent_epoch = Some(1000.0);

        assert_eq!(eligibility(key, &snapshot, gate(), 1599.0), Err(Ineligible::NotDue));
        assert_eq!(eligibility(key, &snapshot, gate(), 1601.0), Ok(()));
    }

    #[test]
    fn priority_overrides_due_gate_but_not_pause() {
        let key = TargetKey::new(1, 1);
        let mut snapshot = baseline();
        snapshot.last_sent_epoch = Some(1000.0);
        snapshot.priority_until = Some(1500.0);

        // Not due (1000 + 600 > 1400) but fast-tracked.
        assert_eq!(eligibility(key, &snapshot, gate(), 1400.0), Ok(()));

        snapshot.pause_until = Some(2000.0);
        assert_eq!(eligibility(key, &snapshot, gate(), 1400.0), Err(Ineligible::Paused));
    }

    #[test]
    fn recent_loss_excludes_target() {
        let key = TargetKey::new(1, 1);
        let mut snapshot = baseline();
        snapshot.last_result = Some(RaidResult::Lost);
        snapshot.last_timestamp = Some(1000.0);

        assert_eq!(eligibility(key, &snapshot, gate(), 2000.0), Err(Ineligible::LossCooldown));
        // Cooldown elapsed; never sent, so due.
        assert_eq!(eligibility(key, &snapshot, gate(), 5000.0), Ok(()));
    }

    #[test]
    fn jitter_is_deterministic_and_bounded() {
        let key = TargetKey::new(12, -7);
        let a = jitter_for(key, 60.0);
        let b = jitter_for(key, 60.0);
        assert!((a - b).abs() < f64::EPSILON);
        assert!((0.0..60.0).contains(&a));
        assert!(jitter_for(key, 0.0).abs() < f64::EPSILON);

        // Different targets generally land on different offsets.
        let other = jitter_for(TargetKey::new(-3, 44), 60.0);
        assert!((a - other).abs() > f64::EPSILON);
    }

    #[test]
    fn next_due_epoch_respects_pause() {
        let key = TargetKey::new(1, 1);
        let mut snapshot = baseline();
        snapshot.last_sent_epoch = Some(1000.0);
        snapshot.pause_until = Some(5000.0);

        let next = next_due_epoch(key, &snapshot, gate(), 1200.0);
        assert!((next - 5000.0).abs() < f64::EPSILON);
    }
}
