pub mod config;
pub mod event;
pub mod reschedule;
pub mod stats;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotwise_core::event::request::parse_datetime;
use slotwise_core::{Calendar, Config, CoreError, EventDb};

/// Open the calendar stored in the data directory.
pub fn open_calendar() -> Result<Calendar, CoreError> {
    let config = Config::load()?;
    tracing::debug!(database = %config.storage.database_file, "opening calendar");
    let db = EventDb::open(&config.storage.database_file)?;
    Calendar::open(Box::new(db), &config.scheduler)
}

/// Parse a timestamp argument with the same rules as event bodies.
pub fn parse_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, CoreError> {
    Ok(parse_datetime(field, value)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
