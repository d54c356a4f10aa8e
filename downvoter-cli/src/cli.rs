//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "downvoter.toml";

/// Downvoter -- rule-based comment moderation.
///
/// Use `downvoter <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "downvoter", version, about, long_about = None)]
pub struct Cli {
    /// Path to the downvoter.toml configuration file.
    ///
    /// When omitted and `downvoter.toml` does not exist, built-in defaults are used.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

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
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage moderation rules.
    Rules(RulesArgs),

    /// Show or reset action statistics.
    Stats(StatsArgs),

    /// Show processed comment ids.
    History(HistoryArgs),

    /// Run the moderation pipeline over JSON-lines discovery input.
    Run(RunArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- rules ----

/// Manage moderation rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List rules in evaluation order.
    List,
    /// Add a rule, or overwrite an existing one with --force.
    Add {
        /// Display name or profile handle to match (case-insensitive).
        username: String,
        /// Comma-separated keywords; any one must appear in the body.
        #[arg(short, long, default_value = "")]
        keywords: String,
        /// Overwrite an existing rule for the same username.
        #[arg(short, long)]
        force: bool,
    },
    /// Remove every rule for a username (exact match).
    Remove {
        /// Username as stored.
        username: String,
    },
    /// Import rules from a YAML or JSON file.
    Import {
        /// Rule file (.yml, .yaml or .json).
        path: PathBuf,
        /// Overwrite existing rules with the same username.
        #[arg(short, long)]
        force: bool,
        /// Replace the whole rule list instead of merging.
        #[arg(long, conflicts_with = "force")]
        replace: bool,
    },
}

// ---- stats ----

/// Show or reset action statistics.
#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(subcommand)]
    pub action: StatsAction,
}

#[derive(Subcommand, Debug)]
pub enum StatsAction {
    /// Show totals and per-author counts.
    Show,
    /// Reset all statistics to zero.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

// ---- history ----

/// Show processed comment ids, most recent last.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Show only the N most recent ids.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

// ---- run ----

/// Run the moderation pipeline.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON-lines discovery input (`-` for stdin).
    #[arg(short, long, default_value = "-")]
    pub input: String,
}

// ---- config ----

/// Manage downvoter configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, storage, engine).
        #[arg(long)]
        section: Option<String>,
    },
}
