//! Free time detection between placed intervals.
//!
//! Finds the stretches of a search window not covered by any placement.
//! The placement solver walks these gaps to find the earliest aligned slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TimeInterval, TimelineIndex};

/// Size category of a time gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSize {
    Small,  // under 30 minutes
    Medium, // 30-59 minutes
    Large,  // 60+ minutes
}

impl GapSize {
    /// Categorize a gap by its duration in minutes
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes < 30 {
            Self::Small
        } else if minutes < 60 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

/// A free stretch of time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGap {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub size: GapSize,
}

impl TimeGap {
    /// Create a new time gap; `None` for empty or inverted ranges
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Option<Self> {
        if start_time >= end_time {
            return None;
        }
        Some(Self {
            start_time,
            end_time,
            size: GapSize::from_minutes((end_time - start_time).num_minutes()),
        })
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Check if this gap can fit a placement of given duration
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes() >= minutes
    }
}

/// Detector for finding free gaps in a window
pub struct TimeGapDetector {
    /// Minimum gap duration to report (in minutes)
    min_gap_minutes: i64,
}

impl TimeGapDetector {
    /// Create a new detector that reports every non-empty gap
    pub fn new() -> Self {
        Self { min_gap_minutes: 0 }
    }

    /// Set the minimum gap duration
    pub fn with_min_gap(mut self, minutes: i64) -> Self {
        self.min_gap_minutes = minutes;
        self
    }

    /// Find gaps between occupied intervals inside `window`.
    ///
    /// `occupied` must be sorted by start time. Returned gaps are sorted too.
    pub fn find_gaps<I>(&self, occupied: I, window: TimeInterval) -> Vec<TimeGap>
    where
        I: IntoIterator<Item = TimeInterval>,
    {
        let mut gaps = Vec::new();
        let mut last_end = window.start;

        for busy in occupied {
            // Skip intervals that end before our current position
            if busy.end <= last_end {
                continue;
            }

            if busy.start >= window.end {
                break;
            }

            if busy.start > last_end {
                self.push_gap(&mut gaps, last_end, busy.start.min(window.end));
            }

            last_end = busy.end.min(window.end);
        }

        // Gap after the last busy interval
        if last_end < window.end {
            self.push_gap(&mut gaps, last_end, window.end);
        }

        gaps
    }

    /// Find gaps among the placements of `index` inside `window`.
    pub fn find_free(&self, index: &TimelineIndex, window: TimeInterval) -> Vec<TimeGap> {
        let occupied = index
            .query_range(window.start, window.end)
            .into_iter()
            .map(|slot| *slot.interval());
        self.find_gaps(occupied, window)
    }

    fn push_gap(&self, gaps: &mut Vec<TimeGap>, start: DateTime<Utc>, end: DateTime<Utc>) {
        if let Some(gap) = TimeGap::new(start, end) {
            if gap.can_fit(self.min_gap_minutes) {
                gaps.push(gap);
            }
        }
    }
}

impl Default for TimeGapDetector {
    fn default() -> Self {
        Self::new()
    }
}
