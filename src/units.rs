//! Unit addressing and troop composition arithmetic.
//!
//! The game exposes two parallel numbering schemes for unit types: a global
//! cross-faction code space (`u1`, `u11`, `u24`, ...) used by map pages and
//! report listings, and a faction-local slot space (`t1`..`t10`) used by the
//! rally point and troop inventory pages. `UnitRef` carries both as one value
//! type; conversion to and from the global code space happens only at the
//! serialization boundary, so all decision logic operates on `{faction, slot}`
//! pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of local unit slots per faction.
pub const SLOTS_PER_FACTION: u8 = 10;

/// Playable factions, in global-code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    /// Global codes u1–u10.
    Romans,
    /// Global codes u11–u20.
    Teutons,
    /// Global codes u21–u30.
    Gauls,
}

impl Faction {
    const ALL: [Self; 3] = [Self::Romans, Self::Teutons, Self::Gauls];

    /// Zero-based position in the global code space.
    #[must_use]
    const fn index(self) -> u8 {
        match self {
            Self::Romans => 0,
            Self::Teutons => 1,
            Self::Gauls => 2,
        }
    }
}

/// A unit type addressed by faction and faction-local slot (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitRef {
    /// Owning faction.
    pub faction: Faction,
    /// Faction-local slot, `1..=SLOTS_PER_FACTION`.
    pub slot: u8,
}

impl UnitRef {
    /// Creates a unit reference. Returns `None` if `slot` is out of range.
    #[must_use]
    pub fn new(faction: Faction, slot: u8) -> Option<Self> {
        (1..=SLOTS_PER_FACTION)
            .contains(&slot)
            .then_some(Self { faction, slot })
    }

    /// The global cross-faction unit code (`1..=30`).
    #[must_use]
    pub const fn global_code(self) -> u8 {
        self.faction.index() * SLOTS_PER_FACTION + self.slot
    }

    /// Resolves a global unit code back to `{faction, slot}`.
    #[must_use]
    pub fn from_global(code: u8) -> Option<Self> {
        if code == 0 {
            return None;
        }
        let faction = *Faction::ALL.get(((code - 1) / SLOTS_PER_FACTION) as usize)?;
        let slot = (code - 1) % SLOTS_PER_FACTION + 1;
        Some(Self { faction, slot })
    }

    /// Faction-local label as shown on rally point pages (`t1`..`t10`).
    #[must_use]
    pub fn slot_label(self) -> String {
        format!("t{}", self.slot)
    }
}

// The global code form (`u14`) is the persisted representation; it is the
// only unambiguous one across factions.
impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.global_code())
    }
}

impl FromStr for UnitRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix('u').unwrap_or_else(|| s.trim());
        let code: u8 = digits
            .parse()
            .map_err(|_| format!("invalid unit code: {s:?}"))?;
        Self::from_global(code).ok_or_else(|| format!("unit code out of range: {s:?}"))
    }
}

impl Serialize for UnitRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

/// A multiset of units: troop inventory, a composition to send, or a
/// composition observed returning.
///
/// Zero counts are never stored; two compositions are equal iff they hold the
/// same non-zero counts for the same units, which is what the reconciler's
/// composition-equality fallback relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Composition(BTreeMap<UnitRef, u32>);

// Upstream data may carry explicit zero entries ("u12": 0); normalize them
// away on the way in so the zero-counts-never-stored invariant holds for
// deserialized compositions too.
impl<'de> Deserialize<'de> for Composition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<UnitRef, u32>::deserialize(deserializer)?;
        Ok(raw.into_iter().filter(|&(_, count)| count > 0).collect())
    }
}

impl Composition {
    /// An empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the count for a unit; a zero count removes the entry.
    pub fn set(&mut self, unit: UnitRef, count: u32) {
        if count == 0 {
            self.0.remove(&unit);
        } else {
            self.0.insert(unit, count);
        }
    }

    /// Count for a unit (zero when absent).
    #[must_use]
    pub fn count(&self, unit: UnitRef) -> u32 {
        self.0.get(&unit).copied().unwrap_or(0)
    }

    /// Total units across all types.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&c| u64::from(c)).sum()
    }

    /// True when no units are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `inventory` holds at least this composition's count of
    /// every unit.
    #[must_use]
    pub fn covered_by(&self, inventory: &Self) -> bool {
        self.0.iter().all(|(unit, &need)| inventory.count(*unit) >= need)
    }

    /// Removes this composition from `inventory`, saturating at zero.
    pub fn deduct_from(&self, inventory: &mut Self) {
        for (unit, &need) in &self.0 {
            let remaining = inventory.count(*unit).saturating_sub(need);
            inventory.set(*unit, remaining);
        }
    }

    /// Adds `count` of `unit` to the composition.
    pub fn add(&mut self, unit: UnitRef, count: u32) {
        if count > 0 {
            let entry = self.0.entry(unit).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    /// Iterates `(unit, count)` pairs in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitRef, u32)> + '_ {
        self.0.iter().map(|(unit, count)| (*unit, *count))
    }
}

impl FromIterator<(UnitRef, u32)> for Composition {
    fn from_iter<I: IntoIterator<Item = (UnitRef, u32)>>(iter: I) -> Self {
        let mut composition = Self::new();
        for (unit, count) in iter {
            composition.add(unit, count);
        }
        composition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(faction: Faction, slot: u8) -> UnitRef {
        UnitRef::new(faction, slot).unwrap()
    }

    #[test]
    fn global_code_round_trips() {
        for faction in [Faction::Romans, Faction::Teutons, Faction::Gauls] {
            for slot in 1..=SLOTS_PER_FACTION {
                let reference = unit(faction, slot);
                assert_eq!(UnitRef::from_global(reference.global_code()), Some(reference));
            }
        }
    }

    #[test]
    fn global_code_spans_factions() {
        assert_eq!(unit(Faction::Romans, 1).global_code(), 1);
        assert_eq!(unit(Faction::Teutons, 4).global_code(), 14);
        assert_eq!(unit(Faction::Gauls, 10).global_code(), 30);
        assert!(UnitRef::from_global(0).is_none());
        assert!(UnitRef::from_global(31).is_none());
    }

    #[test]
    fn serde_uses_global_form() {
        let reference = unit(Faction::Teutons, 4);
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"u14\"");
        let back: UnitRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }

    #[test]
    fn composition_coverage_and_deduction() {
        let tk = unit(Faction::Teutons, 1);
        let paladin = unit(Faction::Teutons, 5);

        let mut inventory = Composition::new();
        inventory.set(tk, 40);
        inventory.set(paladin, 3);

        let mut wanted = Composition::new();
        wanted.set(tk, 25);
        wanted.set(paladin, 3);
        assert!(wanted.covered_by(&inventory));

        wanted.set(paladin, 4);
        assert!(!wanted.covered_by(&inventory));

        wanted.set(paladin, 3);
        wanted.deduct_from(&mut inventory);
        assert_eq!(inventory.count(tk), 15);
        assert_eq!(inventory.count(paladin), 0);
    }

    #[test]
    fn deserialization_drops_explicit_zero_counts() {
        let parsed: Composition = serde_json::from_str(r#"{"u11":25,"u12":0}"#).unwrap();

        let mut expected = Composition::new();
        expected.set(unit(Faction::Teutons, 1), 25);
        assert_eq!(parsed, expected);
        assert_eq!(parsed.total(), 25);
    }

    #[test]
    fn zero_counts_do_not_break_equality() {
        let tk = unit(Faction::Teutons, 1);
        let mut a = Composition::new();
        a.set(tk, 10);
        let mut b = Composition::new();
        b.set(tk, 10);
        b.set(unit(Faction::Teutons, 2), 5);
        b.set(unit(Faction::Teutons, 2), 0);
        assert_eq!(a, b);
        assert_eq!(a.total(), 10);
    }
}
