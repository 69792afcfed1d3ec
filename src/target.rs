//! Canonical identity for raid targets.
//!
//! Upstream scan data produces target coordinates in several textual shapes
//! (`"(12|-34)"`, `" 12 , -34 "`, `"12,-34"`). `TargetKey` normalizes all of
//! them into one value type whose `Display` form — `(x,y)` — is the stable
//! key used by the persisted stores, so lookups never depend on how the
//! coordinate string was produced.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A normalized map coordinate pair identifying a raidable location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    /// Map x coordinate.
    pub x: i32,
    /// Map y coordinate.
    pub y: i32,
}

impl TargetKey {
    /// Creates a key from raw coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another coordinate pair.
    #[must_use]
    pub fn distance_to(&self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Error returned when a coordinate string cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target coordinates: {input:?}")]
pub struct ParseTargetError {
    /// The rejected input, as received.
    pub input: String,
}

impl FromStr for TargetKey {
    type Err = ParseTargetError;

    /// Parses `(x,y)`, `x,y`, or `x|y`, tolerating surrounding whitespace
    /// and whitespace around the separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = || ParseTargetError {
            input: s.to_string(),
        };

        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);

        let (xs, ys) = inner
            .split_once(',')
            .or_else(|| inner.split_once('|'))
            .ok_or_else(reject)?;

        let x = xs.trim().parse::<i32>().map_err(|_| reject())?;
        let y = ys.trim().parse::<i32>().map_err(|_| reject())?;
        Ok(Self { x, y })
    }
}

// Serialized through the canonical string form so JSON map keys stay stable.
impl Serialize for TargetKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_canonical() {
        assert_eq!(TargetKey::new(12, -34).to_string(), "(12,-34)");
    }

    #[test]
    fn parse_accepts_common_shapes() {
        let expected = TargetKey::new(12, -34);
        for input in ["(12,-34)", "12,-34", " 12 , -34 ", "12|-34", "( 12 | -34 )"] {
            assert_eq!(input.parse::<TargetKey>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", "12", "(12,)", "a,b", "(12,-34"] {
            assert!(input.parse::<TargetKey>().is_err(), "{input}");
        }
    }

    #[test]
    fn serde_round_trips_as_string() {
        let key = TargetKey::new(-7, 101);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"(-7,101)\"");
        let back: TargetKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = TargetKey::new(0, 0);
        let b = TargetKey::new(3, 4);
        assert!((a.distance_to(b) - 5.0).abs() < f64::EPSILON);
    }
}
