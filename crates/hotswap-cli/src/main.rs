//! hotswap CLI - hot-reload harness for Rust plugin sources

mod cli;
mod error;

use clap::Parser;
use cli::Cli;
use error::CliError;
use hotswap_plugins::Poller;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = cli.harness_config()?;

    let mut poller = Poller::from_config(&config)?;
    info!(
        "Polling {:?} ({} schedule, teardown: {})",
        poller.workspace().source_dir(),
        config.schedule.mode,
        config.workspace.teardown
    );

    poller.run(cli.iterations)?;
    Ok(())
}
