//! Commitment-to-return matching.
//!
//! Pure functions over one village's returns feed as seen within a single
//! reconciliation pass. The caller owns the `consumed` flags; a feed entry
//! matched once in a pass is never reused, which is the one strict ordering
//! invariant the reconciler guarantees.
//!
//! Matching strategy, in order:
//! 1. When the commitment knows its expected return epoch, pick the usable
//!    entry (target-compatible, troop counts present) whose arrival is
//!    nearest to expected, and accept only within `tolerance_sec`. This
//!    bounds false matches when several raids return close together.
//! 2. Otherwise, match by exact troop-composition equality, tie-broken by
//!    the smallest non-negative `arrival − depart`.
//! 3. Otherwise, if exactly one usable entry names the commitment's target,
//!    match it by elimination.
//!
//! Entries whose troop counts could not be extracted are never matched: an
//! unclassifiable outcome must not score, so the commitment stays pending
//! until it matches a usable entry or times out.

use crate::ledger::CommitmentRecord;
use crate::page::ReturnObservation;

/// True when `entry` could in principle belong to `commitment`.
fn candidate(commitment: &CommitmentRecord, entry: &ReturnObservation) -> bool {
    if entry.returned.is_none() {
        return false;
    }
    match entry.target {
        Some(target) => target == commitment.target,
        None => true,
    }
}

/// Finds the feed entry matching `commitment`, if any.
///
/// `consumed[i]` marks entries already claimed earlier in this pass; they
/// are never considered. Returns the index of the matched entry; the caller
/// marks it consumed.
#[must_use]
pub fn find_match(
    commitment: &CommitmentRecord,
    entries: &[ReturnObservation],
    consumed: &[bool],
    tolerance_sec: f64,
) -> Option<usize> {
    debug_assert_eq!(entries.len(), consumed.len());

    let open = || {
        entries
            .iter()
            .enumerate()
            .filter(|&(index, entry)| !consumed[index] && candidate(commitment, entry))
    };

    if let Some(expected) = commitment.expected_return_epoch {
        let nearest = open().min_by(|(_, a), (_, b)| {
            let da = (a.arrival_epoch - expected).abs();
            let db = (b.arrival_epoch - expected).abs();
            da.total_cmp(&db)
        })?;
        let (index, entry) = nearest;
        return ((entry.arrival_epoch - expected).abs() <= tolerance_sec).then_some(index);
    }

    // No expected time: exact composition equality, earliest plausible
    // arrival first.
    let by_composition = open()
        .filter(|(_, entry)| entry.returned.as_ref() == Some(&commitment.sent_units))
        .filter(|(_, entry)| entry.arrival_epoch >= commitment.depart_epoch)
        .min_by(|(_, a), (_, b)| {
            let da = a.arrival_epoch - commitment.depart_epoch;
            let db = b.arrival_epoch - commitment.depart_epoch;
            da.total_cmp(&db)
        });
    if let Some((index, _)) = by_composition {
        return Some(index);
    }

    // Elimination: a single remaining entry that names this exact target.
    let mut named = open().filter(|(_, entry)| entry.target == Some(commitment.target));
    let (index, _) = named.next()?;
    named.next().is_none().then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CommitmentSource;
    use crate::loot::Loot;
    use crate::page::VillageId;
    use crate::target::TargetKey;
    use crate::units::{Composition, Faction, UnitRef};

    fn units(count: u32) -> Composition {
        let mut composition = Composition::new();
        composition.set(UnitRef::new(Faction::Teutons, 1).unwrap(), count);
        composition
    }

    fn commitment(travel: Option<f64>) -> CommitmentRecord {
        CommitmentRecord::new(
            VillageId(1),
            TargetKey::new(5, 5),
            25,
            units(25),
            1000.0,
            travel,
            CommitmentSource::Oasis,
        )
    }

    fn entry(arrival: f64, returned: Option<Composition>, target: Option<TargetKey>) -> ReturnObservation {
        ReturnObservation {
            target,
            arrival_epoch: arrival,
            returned,
            loot: Loot::new(),
            carry_full: false,
        }
    }

    #[test]
    fn tolerance_match_accepts_within_window() {
        // expected return = 1000 + 2*... use depart 1000, travel 0 → expected 1000.
        let commitment = commitment(Some(0.0));
        let entries = vec![entry(1100.0, Some(units(25)), None)];
        let consumed = vec![false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), Some(0));
    }

    #[test]
    fn tolerance_match_rejects_outside_window() {
        let commitment = commitment(Some(0.0));
        let entries = vec![entry(1200.0, Some(units(25)), None)];
        let consumed = vec![false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), None);
    }

    #[test]
    fn nearest_arrival_wins_when_several_qualify() {
        let commitment = commitment(Some(0.0));
        let entries = vec![
            entry(1110.0, Some(units(10)), None),
            entry(1030.0, Some(units(25)), None),
        ];
        let consumed = vec![false, false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), Some(1));
    }

    #[test]
    fn mismatched_target_is_never_considered() {
        let commitment = commitment(Some(0.0));
        let entries = vec![entry(1000.0, Some(units(25)), Some(TargetKey::new(-9, -9)))];
        let consumed = vec![false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), None);
    }

    #[test]
    fn consumed_entries_are_skipped() {
        let commitment = commitment(Some(0.0));
        let entries = vec![
            entry(1010.0, Some(units(25)), None),
            entry(1050.0, Some(units(25)), None),
        ];

        assert_eq!(find_match(&commitment, &entries, &[true, false], 120.0), Some(1));
        assert_eq!(find_match(&commitment, &entries, &[true, true], 120.0), None);
    }

    #[test]
    fn unusable_entries_never_match() {
        let commitment = commitment(Some(0.0));
        let entries = vec![entry(1000.0, None, Some(TargetKey::new(5, 5)))];
        let consumed = vec![false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), None);
    }

    #[test]
    fn composition_fallback_when_no_expected_time() {
        let commitment = commitment(None);
        let entries = vec![
            // Same composition but arrived before departure: implausible.
            entry(900.0, Some(units(25)), None),
            // Different composition.
            entry(1200.0, Some(units(7)), None),
            // The real return.
            entry(1300.0, Some(units(25)), None),
        ];
        let consumed = vec![false, false, false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), Some(2));
    }

    #[test]
    fn composition_fallback_prefers_earliest_plausible() {
        let commitment = commitment(None);
        let entries = vec![
            entry(2000.0, Some(units(25)), None),
            entry(1100.0, Some(units(25)), None),
        ];
        let consumed = vec![false, false];

        assert_eq!(find_match(&commitment, &entries, &consumed, 120.0), Some(1));
    }

    #[test]
    fn composition_fallback_matches_entries_parsed_with_zero_counts() {
        // Scraped feeds list every slot, including empty ones; an explicit
        // zero row must not defeat composition equality.
        let commitment = commitment(None);
        let returned: Composition = serde_json::from_str(r#"{"u11":25,"u12":0}"#).unwrap();
        let entries = vec![entry(1300.0, Some(returned), None)];

        assert_eq!(find_match(&commitment, &entries, &[false], 120.0), Some(0));
    }

    #[test]
    fn elimination_needs_exactly_one_named_entry() {
        let commitment = commitment(None);
        let target = Some(TargetKey::new(5, 5));

        let single = vec![entry(1500.0, Some(units(11)), target)];
        assert_eq!(find_match(&commitment, &single, &[false], 120.0), Some(0));

        let ambiguous = vec![
            entry(1500.0, Some(units(11)), target),
            entry(1600.0, Some(units(12)), target),
        ];
        assert_eq!(find_match(&commitment, &ambiguous, &[false, false], 120.0), None);

        // Consuming one of the two restores eliminability.
        assert_eq!(find_match(&commitment, &ambiguous, &[true, false], 120.0), Some(1));
    }
}
