//! Timeline of placed intervals.
//!
//! This module provides:
//! - Closed-open time intervals
//! - The ordered index of placements that every placement attempt checks
//! - Free gap detection within a search window

mod gap;
mod index;
mod interval;

pub use gap::{GapSize, TimeGap, TimeGapDetector};
pub use index::{Placement, Slot, TimelineIndex};
pub use interval::TimeInterval;
