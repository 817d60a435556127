//! # Slotwise Core Library
//!
//! Places heterogeneous events on a shared calendar without collisions.
//! Everything is available through the `slotwise` CLI, which is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Event model**: five event kinds as one tagged enum, validated from a
//!   flat request body
//! - **Timeline**: ordered index of non-overlapping placed intervals
//! - **Scheduler**: earliest-fit placement solver, recurrence expansion, and
//!   priority-ordered reschedule passes
//! - **Stats**: weekly per-title duration totals
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`Calendar`]: the thread-safe engine every operation goes through
//! - [`PlacementSolver`]: finds and commits slots
//! - [`TimelineIndex`]: the single source of truth about occupied time
//! - [`EventDb`]: SQLite event repository
//! - [`Config`]: application configuration management

pub mod api;
pub mod engine;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod timeline;

pub use engine::{Calendar, ScheduledEvent};
pub use error::{ConfigError, CoreError, DatabaseError, PlacementError, ValidationError};
pub use event::{Event, EventId, EventKind, EventRequest, PreferredWindow, Priority};
pub use scheduler::{CancelToken, PlacementSolver, RecurrencePolicy, RescheduleReport, SolverConfig};
pub use stats::WeeklyStats;
pub use storage::{Config, EventDb, EventRepository, MemoryRepository};
pub use timeline::{Placement, TimeGap, TimeInterval, TimelineIndex};
