//! # Scheduler Errors
//!
//! Every task-control failure is a local status return. Nothing in the
//! scheduler core panics on a bad request; the caller decides whether a
//! missing task is fatal to the station.

use core::fmt;

/// Reasons a task-control operation can be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum SchedError {
    /// Every slot in the task table is in use (or still holds a pending
    /// one-shot activation).
    AllocationFailed,
    /// The task exists but is not in a state that permits the operation,
    /// e.g. resuming a task that is already running.
    InvalidTransition,
    /// No live task matches the callback name or task id.
    UnknownSelector,
    /// A zero interval would leave the task permanently idle.
    InvalidInterval,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SchedError::AllocationFailed => "task table full",
            SchedError::InvalidTransition => "invalid task state transition",
            SchedError::UnknownSelector => "no live task matches selector",
            SchedError::InvalidInterval => "task interval must be non-zero",
        };
        f.write_str(msg)
    }
}
