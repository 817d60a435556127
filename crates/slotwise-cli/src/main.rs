use clap::{Parser, Subcommand};
use slotwise_core::api::{status_code, ErrorBody};
use slotwise_core::CoreError;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "slotwise", version, about = "Slotwise calendar placement CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list and delete events
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Re-place movable events inside a time window
    Reschedule(commands::reschedule::RescheduleArgs),
    /// Weekly time totals per title
    Stats(commands::stats::StatsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SLOTWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit code for a failed command: 2 for placement conflicts, 1 otherwise.
fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<CoreError>() {
        Some(core) if status_code(core) == 409 => 2,
        _ => 1,
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Event { action } => commands::event::run(action),
        Commands::Reschedule(args) => commands::reschedule::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        match e.downcast_ref::<CoreError>() {
            Some(core) => {
                let body = ErrorBody::from(core);
                match serde_json::to_string(&body) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("error: {e}"),
                }
            }
            None => eprintln!("error: {e}"),
        }
        std::process::exit(exit_code(e.as_ref()));
    }
}
