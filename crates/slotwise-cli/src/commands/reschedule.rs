use clap::Args;
use slotwise_core::api::{RescheduleRequest, RescheduleResponse};

use super::{open_calendar, parse_time, print_json};

#[derive(Args)]
pub struct RescheduleArgs {
    /// Window start
    #[arg(long)]
    from: String,
    /// Window end (exclusive)
    #[arg(long)]
    to: String,
}

impl From<RescheduleArgs> for RescheduleRequest {
    fn from(args: RescheduleArgs) -> Self {
        Self {
            start_date: args.from,
            end_date: args.to,
        }
    }
}

pub fn run(args: RescheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let request = RescheduleRequest::from(args);
    let from = parse_time("start_date", &request.start_date)?;
    let to = parse_time("end_date", &request.end_date)?;

    let calendar = open_calendar()?;
    let report = calendar.reschedule(from, to)?;
    print_json(&RescheduleResponse::from(report))
}
