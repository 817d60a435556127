//! Boundary types for callers of the engine.
//!
//! These mirror the JSON bodies of the calendar's request/response contract so a
//! transport layer (the CLI, or any HTTP front end) can pass them through
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, PlacementError};
use crate::event::{Event, EventId, Priority};
use crate::scheduler::RescheduleReport;
use crate::stats::WeeklyStats;
use crate::timeline::Slot;

pub use crate::event::EventRequest;

/// One placed interval as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub id: EventId,
    pub title: String,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Occurrence number, for recurring events only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<u32>,
    /// The recurring event this occurrence belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EventId>,
}

impl EventView {
    pub fn new(slot: &Slot, event: &Event) -> Self {
        let recurring = event.kind.is_recurring();
        Self {
            id: event.id,
            title: slot.title.clone(),
            priority: event.priority,
            kind: event.kind.type_name().to_string(),
            start: slot.interval().start,
            end: slot.interval().end,
            occurrence: recurring.then_some(slot.placement.occurrence),
            parent_id: recurring.then_some(event.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: EventId,
    /// Placements released by the delete
    pub released: usize,
}

impl DeleteResponse {
    pub fn new(id: EventId, released: usize) -> Self {
        Self {
            message: "Event deleted successfully".into(),
            id,
            released,
        }
    }
}

/// Body of a reschedule call. Timestamps use the same formats as event requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleResponse {
    pub success: usize,
    pub failed: Vec<EventId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl From<RescheduleReport> for RescheduleResponse {
    fn from(report: RescheduleReport) -> Self {
        Self {
            success: report.success,
            failed: report.failed,
            cancelled: report.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub event_durations: BTreeMap<String, i64>,
}

impl From<WeeklyStats> for StatisticsResponse {
    fn from(stats: WeeklyStats) -> Self {
        Self {
            week_start: stats.week_start,
            week_end: stats.week_end,
            event_durations: stats.event_durations,
        }
    }
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        Self {
            code: status_code(err),
            message: err.to_string(),
        }
    }
}

/// HTTP-style status for an engine error.
pub fn status_code(err: &CoreError) -> u16 {
    match err {
        CoreError::Validation(_) => 400,
        CoreError::NotFound(_) => 404,
        CoreError::Placement(
            PlacementError::Conflict { .. }
            | PlacementError::NoSlotAvailable { .. }
            | PlacementError::PartialSeries { .. },
        ) => 409,
        CoreError::Database(_) | CoreError::Config(_) | CoreError::Io(_) | CoreError::Json(_) => 500,
    }
}
