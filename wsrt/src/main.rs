// External crates
use clap::Parser;
use tracing::debug;

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut settings = wsrt_logging::LogSettings::from_env();
    if args.debug {
        settings.level = "debug".to_string();
    }
    let _log_guard = wsrt_logging::init_with(settings);

    debug!(command = ?args.command, "Starting wsrt command");

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
