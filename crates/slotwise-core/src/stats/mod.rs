//! Statistics over placed time.
//!
//! Weekly totals are computed from the timeline itself, so recurring
//! occurrences count once each and events sharing a title accumulate.

mod weekly;

pub use weekly::{week_start_of, weekly_stats, TitleTotal, WeeklyStats};
