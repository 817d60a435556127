//! Event model: priorities, preferred windows, and the five event kinds.
//!
//! An [`Event`] is the repository record. Its concrete placements live in the
//! [`TimelineIndex`](crate::timeline::TimelineIndex), keyed back to the event
//! by [`EventId`] and occurrence number.

pub mod request;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::timeline::TimeInterval;

pub use request::EventRequest;

/// Engine-assigned event identifier. Increasing ids follow creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event priority. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(ValidationError::InvalidValue {
                field: "priority",
                message: format!("expected high, medium or low, got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily clock range `[from, to)` a placement must fall within.
///
/// Textual form is `HH:MM - HH:MM`. Windows never cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreferredWindow {
    from: NaiveTime,
    to: NaiveTime,
}

impl PreferredWindow {
    pub fn new(from: NaiveTime, to: NaiveTime) -> Option<Self> {
        (from < to).then_some(Self { from, to })
    }

    /// Parse `HH:MM - HH:MM`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidPreferredWindow(text.to_string());
        let (from, to) = text.split_once('-').ok_or_else(invalid)?;
        let from = NaiveTime::parse_from_str(from.trim(), "%H:%M").map_err(|_| invalid())?;
        let to = NaiveTime::parse_from_str(to.trim(), "%H:%M").map_err(|_| invalid())?;
        Self::new(from, to).ok_or_else(invalid)
    }

    pub fn from(&self) -> NaiveTime {
        self.from
    }

    pub fn to(&self) -> NaiveTime {
        self.to
    }

    /// The window's concrete interval on a given day.
    pub fn on_day(&self, day: NaiveDate) -> TimeInterval {
        TimeInterval {
            start: day.and_time(self.from).and_utc(),
            end: day.and_time(self.to).and_utc(),
        }
    }
}

impl fmt::Display for PreferredWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.from.format("%H:%M"), self.to.format("%H:%M"))
    }
}

impl TryFrom<String> for PreferredWindow {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PreferredWindow> for String {
    fn from(window: PreferredWindow) -> Self {
        window.to_string()
    }
}

/// Placement constraints, one variant per event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Caller dictates both endpoints. Never moved by the solver.
    Fixed { start: DateTime<Utc>, end: DateTime<Utc> },
    RecurringWithPreferredTime {
        start_date: DateTime<Utc>,
        duration_minutes: i64,
        frequency_days: i64,
        preferred_window: PreferredWindow,
    },
    RecurringWithoutPreferredTime {
        start_date: DateTime<Utc>,
        duration_minutes: i64,
        frequency_days: i64,
    },
    FlexibleWithPreferredTime {
        duration_minutes: i64,
        preferred_window: PreferredWindow,
        earliest_start: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },
    FlexibleWithoutPreferredTime {
        duration_minutes: i64,
        earliest_start: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },
}

impl EventKind {
    /// Wire name of the kind, as used in requests and storage.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::Fixed { .. } => "fixed",
            EventKind::RecurringWithPreferredTime { .. } => "recurring_with_preferred_time",
            EventKind::RecurringWithoutPreferredTime { .. } => "recurring_without_preferred_time",
            EventKind::FlexibleWithPreferredTime { .. } => "flexible_with_preferred_time",
            EventKind::FlexibleWithoutPreferredTime { .. } => "flexible_without_preferred_time",
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, EventKind::Fixed { .. })
    }

    pub fn is_recurring(&self) -> bool {
        matches!(
            self,
            EventKind::RecurringWithPreferredTime { .. } | EventKind::RecurringWithoutPreferredTime { .. }
        )
    }

    /// Length of each placement in minutes.
    pub fn duration_minutes(&self) -> i64 {
        match self {
            EventKind::Fixed { start, end } => (*end - *start).num_minutes(),
            EventKind::RecurringWithPreferredTime { duration_minutes, .. }
            | EventKind::RecurringWithoutPreferredTime { duration_minutes, .. }
            | EventKind::FlexibleWithPreferredTime { duration_minutes, .. }
            | EventKind::FlexibleWithoutPreferredTime { duration_minutes, .. } => *duration_minutes,
        }
    }

    pub fn preferred_window(&self) -> Option<&PreferredWindow> {
        match self {
            EventKind::RecurringWithPreferredTime { preferred_window, .. }
            | EventKind::FlexibleWithPreferredTime { preferred_window, .. } => Some(preferred_window),
            _ => None,
        }
    }

    /// Anchor instant of occurrence `index` for recurring kinds.
    ///
    /// `None` for other kinds, and for anchors past the representable date range.
    pub fn occurrence_anchor(&self, index: u32) -> Option<DateTime<Utc>> {
        match self {
            EventKind::RecurringWithPreferredTime { start_date, frequency_days, .. }
            | EventKind::RecurringWithoutPreferredTime { start_date, frequency_days, .. } => {
                let offset = frequency_days
                    .checked_mul(i64::from(index))
                    .and_then(Duration::try_days)?;
                start_date.checked_add_signed(offset)
            }
            _ => None,
        }
    }
}

/// One occurrence of an event and the interval it last held. An occurrence
/// that was never placed carries the range it was searched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub index: u32,
    pub interval: TimeInterval,
}

/// A validated event that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub priority: Priority,
    pub kind: EventKind,
}

impl NewEvent {
    pub fn into_event(self, id: EventId, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title,
            priority: self.priority,
            kind: self.kind,
            created_at,
            pending: Vec::new(),
        }
    }
}

/// Repository record for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub priority: Priority,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    /// Occurrences without a slot: retracted by a reschedule pass and not
    /// placed again, or left over from a best-effort creation.
    #[serde(default)]
    pub pending: Vec<Occurrence>,
}

impl Event {
    pub fn is_movable(&self) -> bool {
        !self.kind.is_fixed()
    }

    pub fn has_pending_in(&self, window: &TimeInterval) -> bool {
        self.pending.iter().any(|o| o.interval.overlaps(window))
    }
}
