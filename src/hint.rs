//! Advisory next-due hint document.
//!
//! Written on every orchestrator pass for external dashboards; never read
//! back by the engine. One small JSON file per village, replaced atomically.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::page::VillageId;
use crate::persist;
use crate::target::TargetKey;

/// Snapshot of when the village's next target comes due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextDueHint {
    /// Village the orchestrator cycled for.
    pub village_id: VillageId,
    /// The village's own map coordinates.
    pub village_coords: TargetKey,
    /// When this hint was generated.
    pub generated_at: DateTime<Utc>,
    /// Seconds until the next target is due; zero when one is due now.
    /// Absent when the village has no known targets.
    pub next_due_in_sec: Option<f64>,
    /// Absolute epoch of the next due target, when one exists.
    pub next_due_epoch: Option<f64>,
}

/// Writes the hint document via atomic replace.
///
/// # Errors
///
/// Returns a `StoreError` on I/O failure; callers log and continue — the
/// hint is advisory.
pub fn write_hint(path: &Path, hint: &NextDueHint) -> Result<(), StoreError> {
    persist::atomic_write_json(path, hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("next_due.json");

        let hint = NextDueHint {
            village_id: VillageId(3),
            village_coords: TargetKey::new(10, -20),
            generated_at: Utc::now(),
            next_due_in_sec: Some(42.5),
            next_due_epoch: Some(1_700_000_042.5),
        };
        write_hint(&path, &hint).unwrap();

        let back: NextDueHint = crate::persist::load_json(&path).unwrap().unwrap();
        assert_eq!(back, hint);
    }
}
