use chrono::Utc;
use clap::Args;
use slotwise_core::api::StatisticsResponse;

use super::{open_calendar, parse_time, print_json};

#[derive(Args)]
pub struct StatsArgs {
    /// Any time inside the week to report (defaults to now)
    #[arg(long)]
    date: Option<String>,
    /// Print titles ordered by total minutes instead of the raw totals
    #[arg(long)]
    ranked: bool,
}

pub fn run(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let reference = match args.date {
        Some(date) => parse_time("date", &date)?,
        None => Utc::now(),
    };

    let calendar = open_calendar()?;
    let stats = calendar.weekly_stats(reference);
    if args.ranked {
        print_json(&stats.ranked())
    } else {
        print_json(&StatisticsResponse::from(stats))
    }
}
