use clap::{Args, Subcommand};
use slotwise_core::api::DeleteResponse;
use slotwise_core::{EventId, EventRequest};

use super::{open_calendar, parse_time, print_json};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create and place an event
    Create(CreateArgs),
    /// List placed intervals
    List {
        /// Only intervals ending after this time
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Only intervals starting before this time
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    /// Show one event and its placements
    Get {
        /// Event ID
        id: u64,
    },
    /// Delete an event and free its time
    Delete {
        /// Event ID
        id: u64,
    },
    /// Show free gaps between placed intervals
    Free {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Minimum gap length in minutes
        #[arg(long, default_value_t = 0)]
        min: i64,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    /// Full request body as JSON
    #[arg(long, conflicts_with = "title")]
    json: Option<String>,
    #[arg(long)]
    title: Option<String>,
    /// low | medium | high
    #[arg(long)]
    priority: Option<String>,
    /// Event type (defaults to fixed)
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    start_date: Option<String>,
    /// Duration in minutes
    #[arg(long)]
    duration: Option<i64>,
    /// Days between occurrences
    #[arg(long)]
    frequency: Option<i64>,
    /// Daily window, e.g. "09:00 - 12:00"
    #[arg(long)]
    preferred_time: Option<String>,
    #[arg(long)]
    earliest_start: Option<String>,
    #[arg(long)]
    deadline: Option<String>,
}

impl CreateArgs {
    fn into_request(self) -> Result<EventRequest, serde_json::Error> {
        if let Some(json) = self.json {
            return serde_json::from_str(&json);
        }
        Ok(EventRequest {
            title: self.title,
            priority: self.priority,
            kind: self.kind,
            start: self.start,
            end: self.end,
            start_date: self.start_date,
            duration: self.duration,
            frequency: self.frequency,
            preferred_time: self.preferred_time,
            earliest_start: self.earliest_start,
            deadline: self.deadline,
        })
    }
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let calendar = open_calendar()?;

    match action {
        EventAction::Create(args) => {
            let request = args.into_request()?;
            let created = calendar.create_event(&request)?;
            print_json(&created)?;
        }
        EventAction::List { from, to } => {
            let range = match (from, to) {
                (Some(from), Some(to)) => Some((parse_time("from", &from)?, parse_time("to", &to)?)),
                _ => None,
            };
            print_json(&calendar.list_events(range)?)?;
        }
        EventAction::Get { id } => {
            print_json(&calendar.get_event(EventId(id))?)?;
        }
        EventAction::Delete { id } => match calendar.delete_event(EventId(id)) {
            Ok(deleted) => print_json(&DeleteResponse::new(deleted.event.id, deleted.placements.len()))?,
            Err(e) if e.is_benign() => eprintln!("{e}, nothing to delete"),
            Err(e) => return Err(e.into()),
        },
        EventAction::Free { from, to, min } => {
            let gaps = calendar.free_slots(parse_time("from", &from)?, parse_time("to", &to)?, min)?;
            print_json(&gaps)?;
        }
    }
    Ok(())
}
