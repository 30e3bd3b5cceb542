use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use time::{Date, format_description::well_known::Iso8601};

use crate::domain::recurrence::IntervalKind;

/// Command-line arguments for the Fleetdesk binary.
#[derive(Debug, Parser)]
#[command(name = "fleetdesk", version, about = "Fleetdesk back-office server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FLEETDESK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Fleetdesk HTTP service.
    Serve(Box<ServeArgs>),
    /// Print upcoming due dates for an anchor date and interval.
    #[command(name = "next-due")]
    NextDue(NextDueArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Enable or disable the request cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached entries.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<u64>,

    /// Override the fallback cache TTL.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Override the background scheduler cadence.
    #[arg(long = "scheduler-cadence-seconds", value_name = "SECONDS")]
    pub scheduler_cadence_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct NextDueArgs {
    /// Anchor date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub anchor: Date,

    /// Interval kind: weekly, monthly, quarterly, yearly or custom.
    #[arg(long, value_name = "KIND", value_parser = parse_interval_kind)]
    pub interval: IntervalKind,

    /// Day count for custom intervals.
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Number of consecutive due dates to print.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub count: u32,
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, &Iso8601::DATE).map_err(|err| format!("invalid date `{value}`: {err}"))
}

fn parse_interval_kind(value: &str) -> Result<IntervalKind, String> {
    value.parse::<IntervalKind>().map_err(|err| err.to_string())
}
