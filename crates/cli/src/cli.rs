//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry Relay - fire-and-forget usage metrics dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-relay",
    author,
    version,
    about = "Batching, deduplicating usage metrics relay",
    long_about = "Queues usage events in-process, drops repeated \"log once\" events, \n\
                  and delivers them in bounded batches to a log, a file, or the \n\
                  remote collection endpoint."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEMETRY_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEMETRY_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enqueue events and dispatch them
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "relay.toml",
        env = "TELEMETRY_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of events to enqueue ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    pub events: String,

    /// Session token used to authenticate with the collection endpoint
    #[arg(long, env = "TELEMETRY_RELAY_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Override the number of dispatch workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum seconds to wait for the queue to drain (0 = until Ctrl+C)
    #[arg(long, default_value = "30", env = "TELEMETRY_RELAY_LINGER")]
    pub linger: u64,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "TELEMETRY_RELAY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and events, then exit without dispatching
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
