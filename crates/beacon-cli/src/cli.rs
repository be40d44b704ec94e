use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Beacon: recurring reminders with deep-linked notifications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./beacon.toml when present)
    #[arg(short, long, global = true, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overrides logging.level from the configuration
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Post a notification right away
    Send(SendArgs),
    /// Schedule a recurring reminder and follow its cycles
    Remind(RemindArgs),
    /// Resolve a deep link the way a notification click does
    Open(OpenArgs),
    /// List the configured routes
    Routes,
    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct SendArgs {
    /// Notification title
    #[arg(short, long, default_value = "Beacon")]
    pub title: String,

    /// Notification body
    #[arg(short, long, default_value = "")]
    pub content: String,

    /// Deep link path opened on click, e.g. /app/second?id=1
    #[arg(short, long, default_value = "/app/second")]
    pub link: String,

    /// Carry the link verbatim and resolve it only when clicked
    #[arg(long)]
    pub broadcast: bool,

    /// Simulate a click on the posted notification
    #[arg(long)]
    pub click: bool,
}

#[derive(Args)]
pub struct RemindArgs {
    /// Reminder id; scheduling the same id again replaces the reminder
    #[arg(long, default_value_t = 1)]
    pub id: u32,

    #[arg(short, long, default_value = "Reminder")]
    pub title: String,

    #[arg(short, long, default_value = "")]
    pub content: String,

    #[arg(short, long, default_value = "/app/second")]
    pub link: String,

    /// Seconds until the first notification
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Seconds between notifications, overrides scheduler.interval_secs
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many notifications (default: run until Ctrl-C)
    #[arg(long)]
    pub cycles: Option<u32>,

    /// Cancel the reminder after this many seconds
    #[arg(long)]
    pub cancel_after: Option<u64>,
}

#[derive(Args)]
pub struct OpenArgs {
    /// Deep link, e.g. app://route/app/second?x=1
    pub link: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Check the configuration and exit
    Validate,
}
