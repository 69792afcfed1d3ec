//! Engine configuration.
//!
//! The engine consumes but does not own its configuration: the owning
//! process builds an `EngineConfig` (typically from its own config file),
//! validates it once, and hands it to the stores, reconciler, and
//! orchestrator. All durations are plain seconds to match the epoch-second
//! arithmetic used throughout the engine.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for learning, matching, and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lower clamp for the learned per-target multiplier.
    pub min_multiplier: f64,
    /// Upper clamp for the learned per-target multiplier.
    pub max_multiplier: f64,

    /// Upward nudge applied when a commitment times out unobserved.
    pub step_lost: f64,
    /// Upward nudge applied when a raid returns with cargo at capacity.
    pub step_full_loot: f64,

    /// Maximum |arrival − expected| for a tolerance match, in seconds.
    pub match_tolerance_sec: f64,
    /// Grace past the expected return before a commitment counts as lost.
    pub return_timeout_sec: f64,
    /// Timeout for commitments that never learned a travel time.
    pub max_commitment_age_sec: f64,

    /// Base re-raid interval per target, in seconds.
    pub target_interval_sec: f64,
    /// Per-target deterministic jitter added to the interval, in seconds.
    pub interval_jitter_sec: f64,
    /// Hard exclusion window after a raid that lost troops.
    pub cooldown_on_loss_sec: f64,
    /// Length of the priority window set by a full-loot immediate retry.
    pub priority_retry_window_sec: f64,

    /// Consecutive insufficient-troop skips before a cycle ends early.
    pub max_skips: u32,
    /// Whether an unaffordable band may promote to the next band.
    pub promotion_enabled: bool,
    /// Minimum group size for a band's base escort unit.
    pub min_base_group: u32,

    /// Rolling attempt-history entries kept per target.
    pub history_cap: usize,
    /// Multiplier change-log entries kept per target.
    pub change_log_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_multiplier: 0.8,
            max_multiplier: 2.5,
            step_lost: 0.25,
            step_full_loot: 1.0,
            match_tolerance_sec: 120.0,
            return_timeout_sec: 900.0,
            max_commitment_age_sec: 6.0 * 3600.0,
            target_interval_sec: 600.0,
            interval_jitter_sec: 60.0,
            cooldown_on_loss_sec: 3600.0,
            priority_retry_window_sec: 180.0,
            max_skips: 5,
            promotion_enabled: true,
            min_base_group: 2,
            history_cap: 20,
            change_log_cap: 50,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration, returning it for chaining.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first rejected field.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.min_multiplier > 0.0 && self.min_multiplier <= self.max_multiplier) {
            return Err(ConfigError::InvalidMultiplierBounds {
                min: self.min_multiplier,
                max: self.max_multiplier,
            });
        }

        for (name, value) in [
            ("step_lost", self.step_lost),
            ("step_full_loot", self.step_full_loot),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositiveStep { name, value });
            }
        }

        for (name, value) in [
            ("match_tolerance_sec", self.match_tolerance_sec),
            ("return_timeout_sec", self.return_timeout_sec),
            ("max_commitment_age_sec", self.max_commitment_age_sec),
            ("target_interval_sec", self.target_interval_sec),
            ("interval_jitter_sec", self.interval_jitter_sec),
            ("cooldown_on_loss_sec", self.cooldown_on_loss_sec),
            ("priority_retry_window_sec", self.priority_retry_window_sec),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeDuration { name, value });
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_bounds_rejected() {
        let config = EngineConfig {
            min_multiplier: 3.0,
            max_multiplier: 1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMultiplierBounds { .. })
        ));
    }

    #[test]
    fn zero_step_rejected() {
        let config = EngineConfig {
            step_lost: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveStep { name: "step_lost", .. })
        ));
    }

    #[test]
    fn negative_duration_rejected() {
        let config = EngineConfig {
            cooldown_on_loss_sec: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeDuration { .. })
        ));
    }
}
