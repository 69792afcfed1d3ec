//! Error taxonomy for the raid engine.
//!
//! Each layer owns a small typed error enum. Nothing in this crate should
//! terminate the owning process: external-boundary and persistence failures
//! all resolve to "skip and continue" or "retry next pass" at the call site,
//! and the `SkipReason` codes make those non-fatal outcomes observable.

use std::path::PathBuf;

use thiserror::Error;

use crate::target::TargetKey;

/// Failures at the external page/session boundary.
///
/// All of these are transient from the engine's point of view: the affected
/// target or pass is skipped and retried on a later cycle.
#[derive(Debug, Error)]
pub enum PageError {
    /// Network-level failure fetching or posting a page.
    #[error("network failure talking to the game server: {0}")]
    Network(String),

    /// The page was fetched but did not contain the expected structure.
    #[error("unexpected page structure: {0}")]
    Parse(String),

    /// The session is no longer valid (login expired, server maintenance).
    #[error("session rejected: {0}")]
    Session(String),
}

/// Failures persisting or loading a durable store file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem I/O failed.
    #[error("store i/o failure on {path:?}: {source}")]
    Io {
        /// Backing file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file held unparseable JSON.
    #[error("store file {path:?} is corrupt: {source}")]
    Corrupt {
        /// Backing file involved.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing in-memory state failed (should not happen with valid data).
    #[error("store serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the commitment ledger file.
///
/// Unlike the outcome store, ledger operations surface their errors: the
/// reconciler logs them and retries on its next pass rather than silently
/// losing pending commitments.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Multiplier bounds are inverted or non-positive.
    #[error("invalid multiplier bounds [{min}, {max}]")]
    InvalidMultiplierBounds {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },

    /// A nudge step must be positive.
    #[error("nudge step '{name}' must be positive (got {value})")]
    NonPositiveStep {
        /// Which step was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A duration-like setting must be non-negative.
    #[error("duration '{name}' must be non-negative (got {value})")]
    NegativeDuration {
        /// Which setting was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Why the orchestrator passed over a target during a cycle.
///
/// These are observability codes, not errors; a skipped target stays due and
/// is reconsidered on the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No configured band contains the target's distance.
    NoBand,
    /// Neither the target's band nor a promotable band was affordable.
    InsufficientTroops,
    /// The external validator rejected the target.
    ValidationRejected(String),
    /// An external call failed while handling this target.
    PageFailure(String),
    /// Dispatch itself reported failure.
    DispatchFailed(String),
}

/// A per-target skip note emitted by an orchestrator cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipNote {
    /// The target passed over.
    pub target: TargetKey,
    /// Why it was passed over.
    pub reason: SkipReason,
}
