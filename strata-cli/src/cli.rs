//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Strata -- SBOM scan engine for extracted filesystem trees.
///
/// Use `strata <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
pub struct Cli {
    /// Path to the strata.toml configuration file.
    #[arg(short, long, default_value = "strata.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a one-shot scan over an extracted filesystem tree.
    Scan(ScanArgs),

    /// Manage component pattern files.
    Patterns(PatternsArgs),
}

// ---- scan ----

/// Run a one-shot scan and print the resulting inventory.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Root of the extracted tree to scan (default: current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Override the component pattern directory.
    #[arg(long)]
    pub pattern_dir: Option<PathBuf>,

    /// Override the reference hint db path.
    #[arg(long)]
    pub hint_db: Option<PathBuf>,

    /// Disable implicit unwrapping (archives stay leaf artifacts).
    #[arg(long)]
    pub no_implicit_unwrap: bool,

    /// Abort the scan after this many seconds (0 = unlimited).
    /// Checked only between queue pops.
    #[arg(long, default_value_t = 0)]
    pub max_scan_secs: u64,

    /// Include deletion-marked rows in the output.
    #[arg(long)]
    pub all: bool,
}

// ---- patterns ----

/// Manage component pattern files.
#[derive(Args, Debug)]
pub struct PatternsArgs {
    #[command(subcommand)]
    pub action: PatternsAction,
}

#[derive(Subcommand, Debug)]
pub enum PatternsAction {
    /// Compile-check a pattern directory without scanning.
    Validate {
        /// Pattern directory (default: from configuration).
        dir: Option<PathBuf>,
    },
}
