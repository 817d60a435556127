//! Recurrence expansion.
//!
//! Occurrence `k` of a recurring event is anchored at
//! `start_date + k * frequency_days` and searched within the UTC day of its
//! anchor: the preferred window on that day when one is set, else the whole day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::event::{EventKind, PreferredWindow};
use crate::timeline::TimeInterval;

/// One occurrence to place and the range to search for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrencePlan {
    pub index: u32,
    pub anchor: DateTime<Utc>,
    pub search: TimeInterval,
}

/// The whole UTC day containing `day`.
pub fn whole_day(day: NaiveDate) -> TimeInterval {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    TimeInterval {
        start,
        end: start
            .checked_add_signed(Duration::days(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

fn search_range(anchor: DateTime<Utc>, window: Option<&PreferredWindow>) -> TimeInterval {
    let day = anchor.date_naive();
    match window {
        Some(window) => window.on_day(day),
        None => whole_day(day),
    }
}

/// Plan occurrence `index` of a recurring kind. `None` for other kinds.
pub fn plan_occurrence(kind: &EventKind, index: u32) -> Option<OccurrencePlan> {
    let anchor = kind.occurrence_anchor(index)?;
    Some(OccurrencePlan {
        index,
        anchor,
        search: search_range(anchor, kind.preferred_window()),
    })
}

/// Every occurrence whose anchor lies in `horizon`, in chronological order.
pub fn expand(kind: &EventKind, horizon: &TimeInterval) -> Vec<OccurrencePlan> {
    let (start_date, frequency_days) = match kind {
        EventKind::RecurringWithPreferredTime { start_date, frequency_days, .. }
        | EventKind::RecurringWithoutPreferredTime { start_date, frequency_days, .. } => {
            (*start_date, *frequency_days)
        }
        _ => return Vec::new(),
    };
    if frequency_days < 1 {
        return Vec::new();
    }

    // Skip straight to the first anchor at or after the horizon start. A step
    // too large to count in seconds leaves nothing after anchor 0.
    let first = if horizon.start <= start_date {
        0
    } else {
        let behind = (horizon.start - start_date).num_seconds();
        match frequency_days.checked_mul(86_400) {
            Some(step) => behind / step + i64::from(behind % step != 0),
            None => return Vec::new(),
        }
    };

    let mut plans = Vec::new();
    let mut k = first;
    while let Ok(index) = u32::try_from(k) {
        let Some(plan) = plan_occurrence(kind, index) else {
            break;
        };
        if plan.anchor >= horizon.end {
            break;
        }
        plans.push(plan);
        k += 1;
    }
    plans
}
