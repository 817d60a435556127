//! Placement solver.
//!
//! Finds the earliest conflict-free slot for an event's constraints and
//! commits it to the [`TimelineIndex`] in the same call. Candidate starts sit
//! on a fixed grid (`granularity_minutes`) anchored at the start of each search
//! range; among several valid slots the earliest always wins.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::recurrence::{self, OccurrencePlan};
use crate::error::PlacementError;
use crate::event::{Event, EventKind};
use crate::timeline::{Placement, TimeGapDetector, TimeInterval, TimelineIndex};

/// What to do when only part of a recurring series can be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePolicy {
    /// Roll back every occurrence if any occurrence fails
    AllOrNothing,
    /// Keep whatever could be placed
    BestEffort,
}

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Spacing of candidate start times (minutes)
    pub granularity_minutes: i64,
    /// Recurrence horizon used on creation (days from `start_date`)
    pub default_horizon_days: i64,
    /// Retry without the preferred window when the window is full
    pub allow_window_fallback: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            granularity_minutes: 15,
            default_horizon_days: 30,
            allow_window_fallback: false,
        }
    }
}

/// Result of a placement call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlacementReport {
    /// Placements committed to the index
    pub placed: Vec<Placement>,
    /// Occurrences that found no slot (best-effort only)
    pub failed: Vec<u32>,
}

impl PlacementReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Earliest-fit placement solver
#[derive(Debug, Clone, Default)]
pub struct PlacementSolver {
    config: SolverConfig,
}

impl PlacementSolver {
    /// Create a new solver with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Default recurrence horizon for an event: `[start_date, start_date + horizon_days)`.
    pub fn creation_horizon(&self, event: &Event) -> Option<TimeInterval> {
        let start = event.kind.occurrence_anchor(0)?;
        let end = Duration::try_days(self.config.default_horizon_days.max(1))
            .and_then(|days| start.checked_add_signed(days))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        TimeInterval::new(start, end)
    }

    /// Place a freshly created event.
    ///
    /// Recurring events expand over the default horizon under `policy`.
    pub fn place(
        &self,
        index: &mut TimelineIndex,
        event: &Event,
        policy: RecurrencePolicy,
    ) -> Result<PlacementReport, PlacementError> {
        match self.creation_horizon(event) {
            Some(horizon) => self.place_within(index, event, horizon, policy),
            None => self.place_single(index, event),
        }
    }

    /// Place an event, expanding recurrences over a caller-supplied horizon.
    pub fn place_within(
        &self,
        index: &mut TimelineIndex,
        event: &Event,
        horizon: TimeInterval,
        policy: RecurrencePolicy,
    ) -> Result<PlacementReport, PlacementError> {
        if !event.kind.is_recurring() {
            return self.place_single(index, event);
        }
        let plans = recurrence::expand(&event.kind, &horizon);
        self.place_series(index, event, &plans, policy)
    }

    /// Best-effort placement of specific occurrences (used by reschedule).
    pub fn place_occurrences(
        &self,
        index: &mut TimelineIndex,
        event: &Event,
        occurrences: &[u32],
    ) -> PlacementReport {
        let mut report = PlacementReport::default();
        for &occurrence in occurrences {
            match self.commit(index, event, occurrence) {
                Some(placement) => report.placed.push(placement),
                None => report.failed.push(occurrence),
            }
        }
        report
    }

    fn place_single(
        &self,
        index: &mut TimelineIndex,
        event: &Event,
    ) -> Result<PlacementReport, PlacementError> {
        if let EventKind::Fixed { start, end } = event.kind {
            let interval = TimeInterval { start, end };
            index.insert(Placement::new(event.id, 0, interval), &event.title)?;
            tracing::debug!(event = %event.id, %interval, "fixed event placed");
            return Ok(PlacementReport {
                placed: vec![Placement::new(event.id, 0, interval)],
                failed: Vec::new(),
            });
        }

        match self.commit(index, event, 0) {
            Some(placement) => Ok(PlacementReport {
                placed: vec![placement],
                failed: Vec::new(),
            }),
            None => Err(PlacementError::NoSlotAvailable { event: event.id }),
        }
    }

    fn place_series(
        &self,
        index: &mut TimelineIndex,
        event: &Event,
        plans: &[OccurrencePlan],
        policy: RecurrencePolicy,
    ) -> Result<PlacementReport, PlacementError> {
        let mut report = PlacementReport::default();
        for plan in plans {
            match self.commit(index, event, plan.index) {
                Some(placement) => report.placed.push(placement),
                None => {
                    tracing::debug!(event = %event.id, occurrence = plan.index, "occurrence found no slot");
                    report.failed.push(plan.index);
                }
            }
        }

        if report.placed.is_empty() {
            return Err(PlacementError::NoSlotAvailable { event: event.id });
        }

        if policy == RecurrencePolicy::AllOrNothing && !report.is_complete() {
            for placement in &report.placed {
                index.remove_occurrence(placement.event_id, placement.occurrence);
            }
            tracing::warn!(
                event = %event.id,
                placed = report.placed.len(),
                failed = report.failed.len(),
                "series rolled back"
            );
            return Err(PlacementError::PartialSeries {
                event: event.id,
                placed: report.placed.len(),
                failed: report.failed.len(),
            });
        }

        Ok(report)
    }

    /// Locate and insert one occurrence.
    fn commit(&self, index: &mut TimelineIndex, event: &Event, occurrence: u32) -> Option<Placement> {
        let interval = self.locate(index, &event.kind, occurrence)?;
        let placement = Placement::new(event.id, occurrence, interval);
        match index.insert(placement, &event.title) {
            Ok(()) => {
                tracing::debug!(event = %event.id, occurrence, %interval, "slot found");
                Some(placement)
            }
            Err(err) => {
                tracing::warn!(event = %event.id, %err, "located slot was not free");
                None
            }
        }
    }

    /// Find the earliest valid interval for one occurrence without inserting it.
    pub fn locate(&self, index: &TimelineIndex, kind: &EventKind, occurrence: u32) -> Option<TimeInterval> {
        let duration = kind.duration_minutes();
        match kind {
            EventKind::Fixed { start, end } => {
                let interval = TimeInterval::new(*start, *end)?;
                (!index.overlaps(&interval)).then_some(interval)
            }
            EventKind::RecurringWithPreferredTime { .. } => {
                let plan = recurrence::plan_occurrence(kind, occurrence)?;
                self.find_slot(index, duration, plan.search).or_else(|| {
                    if self.config.allow_window_fallback {
                        self.find_slot(index, duration, recurrence::whole_day(plan.anchor.date_naive()))
                    } else {
                        None
                    }
                })
            }
            EventKind::RecurringWithoutPreferredTime { .. } => {
                let plan = recurrence::plan_occurrence(kind, occurrence)?;
                self.find_slot(index, duration, plan.search)
            }
            EventKind::FlexibleWithPreferredTime {
                preferred_window,
                earliest_start,
                deadline,
                ..
            } => {
                let range = TimeInterval::new(*earliest_start, *deadline)?;
                let mut day = earliest_start.date_naive();
                while day <= deadline.date_naive() {
                    if let Some(search) = preferred_window.on_day(day).intersect(&range) {
                        if let Some(slot) = self.find_slot(index, duration, search) {
                            return Some(slot);
                        }
                    }
                    day = day.succ_opt()?;
                }
                if self.config.allow_window_fallback {
                    self.find_slot(index, duration, range)
                } else {
                    None
                }
            }
            EventKind::FlexibleWithoutPreferredTime {
                earliest_start,
                deadline,
                ..
            } => self.find_slot(index, duration, TimeInterval::new(*earliest_start, *deadline)?),
        }
    }

    /// Earliest grid-aligned start inside `search` where `duration` fits.
    fn find_slot(&self, index: &TimelineIndex, duration: i64, search: TimeInterval) -> Option<TimeInterval> {
        if duration <= 0 || search.duration_minutes() < duration {
            return None;
        }
        let gaps = TimeGapDetector::new()
            .with_min_gap(duration)
            .find_free(index, search);

        gaps.into_iter().find_map(|gap| {
            let start = self.align(gap.start_time, search.start);
            let slot = TimeInterval::starting_at(start, duration)?;
            (slot.end <= gap.end_time).then_some(slot)
        })
    }

    /// Round `instant` up onto the candidate grid anchored at `anchor`.
    fn align(&self, instant: DateTime<Utc>, anchor: DateTime<Utc>) -> DateTime<Utc> {
        if instant <= anchor {
            return anchor;
        }
        let step = self.config.granularity_minutes.max(1) * 60;
        let offset = (instant - anchor).num_seconds();
        let steps = (offset + step - 1) / step;
        anchor + Duration::seconds(steps * step)
    }
}
