//! Clap derive structures for the `powerwall` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// powerwall -- poll an energy gateway into InfluxDB
#[derive(Debug, Parser)]
#[command(
    name = "powerwall",
    version,
    about = "Poll an energy gateway and write its telemetry to InfluxDB",
    long_about = "Logs in to the gateway's local API, reads the meter aggregates and\n\
        battery state of energy on a fixed interval, and writes both as\n\
        InfluxDB points. Settings come from an optional TOML file and\n\
        TESLA_* environment variables.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// TOML settings file, layered under the environment
    #[arg(long, short = 'c', env = "TESLA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the gateway until interrupted (default)
    Run,

    /// Log in, fetch both readings once, and print them as JSON
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}
