//! `downvoter` binary entry point

use clap::Parser;
use colored::Colorize;

use downvoter_cli::cli::Cli;
use downvoter_cli::output::OutputWriter;
use downvoter_cli::{commands, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let writer = OutputWriter::new(cli.output);

    let mut general = commands::resolve_general(cli.config.as_deref()).await;
    if let Some(level) = cli.log_level {
        general.log_level = level;
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("{} {e:#}", "warning:".yellow().bold());
    }

    if let Err(e) = commands::dispatch(cli.command, cli.config.as_deref(), &writer).await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(e.exit_code());
    }
}
