//! Weekly duration totals per title.
//!
//! Weeks start Monday 00:00 UTC and last seven days. An interval belongs to
//! the week its start falls in, even when it runs past the week end.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::timeline::TimelineIndex;

/// Minutes scheduled per title within one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    /// Monday 00:00 UTC
    pub week_start: DateTime<Utc>,
    /// Exclusive end, `week_start + 7d`
    pub week_end: DateTime<Utc>,
    /// Title -> total minutes
    pub event_durations: BTreeMap<String, i64>,
}

/// One row of [`WeeklyStats::ranked`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleTotal {
    pub title: String,
    pub minutes: i64,
}

impl WeeklyStats {
    /// Totals ordered by minutes descending, then title.
    pub fn ranked(&self) -> Vec<TitleTotal> {
        let mut rows: Vec<TitleTotal> = self
            .event_durations
            .iter()
            .map(|(title, minutes)| TitleTotal {
                title: title.clone(),
                minutes: *minutes,
            })
            .collect();
        rows.sort_by(|a, b| match b.minutes.cmp(&a.minutes) {
            std::cmp::Ordering::Equal => a.title.cmp(&b.title),
            other => other,
        });
        rows
    }

    /// Sum of all titles.
    pub fn total_minutes(&self) -> i64 {
        self.event_durations.values().sum()
    }
}

/// Monday 00:00 UTC of the week containing `reference`.
pub fn week_start_of(reference: DateTime<Utc>) -> DateTime<Utc> {
    let day = reference.date_naive();
    let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// Aggregate the placed intervals starting in the week of `reference`.
pub fn weekly_stats(index: &TimelineIndex, reference: DateTime<Utc>) -> WeeklyStats {
    let week_start = week_start_of(reference);
    let week_end = week_start + Duration::days(7);

    let mut event_durations = BTreeMap::new();
    for slot in index.starting_within(week_start, week_end) {
        *event_durations.entry(slot.title.clone()).or_insert(0) += slot.interval().duration_minutes();
    }

    WeeklyStats {
        week_start,
        week_end,
        event_durations,
    }
}
