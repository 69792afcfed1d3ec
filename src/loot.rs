//! Loot resource types and aggregation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The four lootable resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Lumber.
    Wood,
    /// Clay.
    Clay,
    /// Iron.
    Iron,
    /// Crop.
    Crop,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wood => "wood",
            Self::Clay => "clay",
            Self::Iron => "iron",
            Self::Crop => "crop",
        };
        f.write_str(name)
    }
}

/// A per-resource amount breakdown, used both for single-raid hauls and for
/// cumulative per-target aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Loot(BTreeMap<Resource, u64>);

impl Loot {
    /// An empty haul.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount of one resource (zero when absent).
    #[must_use]
    pub fn amount(&self, resource: Resource) -> u64 {
        self.0.get(&resource).copied().unwrap_or(0)
    }

    /// Sets the amount for one resource; zero removes the entry.
    pub fn set(&mut self, resource: Resource, amount: u64) {
        if amount == 0 {
            self.0.remove(&resource);
        } else {
            self.0.insert(resource, amount);
        }
    }

    /// Sum across all resources.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Accumulates another haul into this one, saturating on overflow.
    pub fn absorb(&mut self, other: &Self) {
        for (&resource, &amount) in &other.0 {
            let entry = self.0.entry(resource).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// True when no resources are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Resource, u64)> for Loot {
    fn from_iter<I: IntoIterator<Item = (Resource, u64)>>(iter: I) -> Self {
        let mut loot = Self::new();
        for (resource, amount) in iter {
            loot.set(resource, loot.amount(resource).saturating_add(amount));
        }
        loot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_accumulates() {
        let mut cumulative = Loot::new();
        cumulative.set(Resource::Wood, 100);

        let haul: Loot = [(Resource::Wood, 40), (Resource::Crop, 10)].into_iter().collect();
        cumulative.absorb(&haul);

        assert_eq!(cumulative.amount(Resource::Wood), 140);
        assert_eq!(cumulative.amount(Resource::Crop), 10);
        assert_eq!(cumulative.total(), 150);
    }

    #[test]
    fn repeated_resources_accumulate_and_saturate() {
        let loot: Loot = [(Resource::Wood, 30), (Resource::Wood, 12)].into_iter().collect();
        assert_eq!(loot.amount(Resource::Wood), 42);

        let huge: Loot = [(Resource::Crop, u64::MAX), (Resource::Crop, 1)]
            .into_iter()
            .collect();
        assert_eq!(huge.amount(Resource::Crop), u64::MAX);
    }

    #[test]
    fn zero_amounts_are_not_stored() {
        let mut loot = Loot::new();
        loot.set(Resource::Iron, 5);
        loot.set(Resource::Iron, 0);
        assert!(loot.is_empty());
    }
}
