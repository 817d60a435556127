//! Event placement.
//!
//! This module places events onto the shared timeline:
//! - Finds the earliest conflict-free slot for each event kind
//! - Expands recurring events into occurrences over a horizon
//! - Re-places movable events in priority order during a reschedule pass

pub mod recurrence;
mod reschedule;
mod solver;

pub use reschedule::{CancelToken, JobOutcome, RescheduleJob, RescheduleReport, Rescheduler};
pub use solver::{PlacementReport, PlacementSolver, RecurrencePolicy, SolverConfig};
