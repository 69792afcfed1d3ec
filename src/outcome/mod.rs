//! Per-target outcome learning: records, the multiplier audit log, and the
//! durable store that owns them.

mod record;
mod store;

pub use record::{
    Attempt, AttemptSnapshot, MultiplierChange, NudgeDirection, OutcomeRecord, RaidResult,
};
pub use store::{BaselineSnapshot, OutcomeStore};
