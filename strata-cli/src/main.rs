//! strata-cli entry point
//!
//! Parses arguments, initialises tracing from the configuration (with CLI
//! override), dispatches to the subcommand handler, and maps errors to
//! process exit codes.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &cli.config, &writer).await,
        Commands::Patterns(args) => commands::patterns::execute(args, &cli.config, &writer).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

/// Initialise the global tracing subscriber.
///
/// Diagnostics go to stderr so that rendered output on stdout stays
/// machine-parseable. `RUST_LOG` wins over the CLI flag.
fn init_tracing(log_level: Option<&str>) {
    let default_level = log_level.unwrap_or("warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
