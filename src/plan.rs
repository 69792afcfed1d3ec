//! Distance-banded troop plans.
//!
//! A `TroopPlan` is configuration, never mutated at runtime: an ordered list
//! of distance bands, each pairing a half-open distance interval
//! `[start, end)` with the troop composition to send into it. Bands are
//! contiguous and non-overlapping by convention, but the plan tolerates gaps
//! and overlaps in hand-written configuration: selection always verifies
//! numeric containment rather than trusting band order.

use serde::{Deserialize, Serialize};

use crate::units::{Composition, UnitRef};

/// One unit entry of a band's composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandUnit {
    /// The unit type to send.
    pub unit: UnitRef,
    /// Base group size before the per-target multiplier is applied.
    pub group_size: u32,
}

/// A distance interval with its associated troop composition.
///
/// The first listed unit is the band's base escort unit; the minimum
/// functional group size floor applies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceBand {
    /// Interval start, inclusive.
    pub start: f64,
    /// Interval end, exclusive.
    pub end: f64,
    /// Composition to send, in escort-first order.
    pub units: Vec<BandUnit>,
}

impl DistanceBand {
    /// True when `distance` falls in this band's `[start, end)` interval.
    #[must_use]
    pub fn contains(&self, distance: f64) -> bool {
        distance >= self.start && distance < self.end
    }

    /// The band's composition with the per-target multiplier applied.
    ///
    /// Each group size becomes `round(base * multiplier)`, floored at 1
    /// whenever the base is non-zero. The base escort unit (first entry)
    /// additionally never drops below `min_base_group`, so a low learned
    /// multiplier cannot shrink the escort past its functional minimum.
    #[must_use]
    pub fn adjusted_composition(&self, multiplier: f64, min_base_group: u32) -> Composition {
        let mut composition = Composition::new();
        for (index, entry) in self.units.iter().enumerate() {
            if entry.group_size == 0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let mut scaled = (f64::from(entry.group_size) * multiplier).round().max(1.0) as u32;
            if index == 0 {
                scaled = scaled.max(min_base_group);
            }
            composition.set(entry.unit, scaled);
        }
        composition
    }

}

/// Ordered collection of distance bands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TroopPlan {
    bands: Vec<DistanceBand>,
}

impl TroopPlan {
    /// Creates a plan from bands in configuration order.
    #[must_use]
    pub fn new(bands: Vec<DistanceBand>) -> Self {
        Self { bands }
    }

    /// All bands in configuration order.
    #[must_use]
    pub fn bands(&self) -> &[DistanceBand] {
        &self.bands
    }

    /// Selects the band containing `distance`, together with its index.
    ///
    /// Returns the first containing band in configuration order; with
    /// well-formed (non-overlapping) configuration it is unique. A distance
    /// falling in a configuration gap selects nothing.
    #[must_use]
    pub fn band_for(&self, distance: f64) -> Option<(usize, &DistanceBand)> {
        self.bands
            .iter()
            .enumerate()
            .find(|(_, band)| band.contains(distance))
    }

    /// The promotion candidate for the band at `index`: the next band in
    /// configuration order, but only if it also numerically contains
    /// `distance`. A target is never promoted into a band it does not
    /// belong to.
    #[must_use]
    pub fn promotion_candidate(&self, index: usize, distance: f64) -> Option<(usize, &DistanceBand)> {
        let next = index.checked_add(1)?;
        let band = self.bands.get(next)?;
        band.contains(distance).then_some((next, band))
    }

    /// The largest band end, i.e. the plan's distance ceiling.
    #[must_use]
    pub fn max_distance(&self) -> f64 {
        self.bands.iter().map(|band| band.end).fold(0.0, f64::max)
    }

    /// True when no band exists at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}
