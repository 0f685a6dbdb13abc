//! Clap derive structures for the `eveus` CLI.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// eveus -- query and control Eveus EV chargers
#[derive(Debug, Parser)]
#[command(
    name = "eveus",
    version,
    about = "Query and control Eveus EV chargers from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Charger profile to use
    #[arg(long, short = 'p', env = "EVEUS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Charger host or URL (overrides profile)
    #[arg(long, short = 'H', env = "EVEUS_HOST", global = true)]
    pub host: Option<String>,

    /// Charger username
    #[arg(long, short = 'u', env = "EVEUS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Charger password
    #[arg(long, env = "EVEUS_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Charger model (16A or 32A)
    #[arg(long, short = 'm', env = "EVEUS_MODEL", global = true)]
    pub model: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "EVEUS_OUTPUT", default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "EVEUS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// How long to wait for the first successful poll (e.g. "30s", "2m")
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration, global = true)]
    pub wait: Duration,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show current charger telemetry
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Follow telemetry updates as they arrive
    Watch(WatchArgs),

    /// Show connection health diagnostics
    Health,

    /// Allow the charger to deliver power
    Enable(WriteArgs),

    /// Stop the charger from delivering power
    Disable(WriteArgs),

    /// Set the charging current limit in amps
    SetCurrent(SetCurrentArgs),

    /// Toggle one-charge mode
    OneCharge(OneChargeArgs),

    /// Reset energy counter A
    ResetCounter(WriteArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Read commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show every field the charger reports
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Write commands ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Skip re-reading the charger to confirm the change
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Debug, Args)]
pub struct SetCurrentArgs {
    /// Current limit in amps
    pub amps: u8,

    #[command(flatten)]
    pub write: WriteArgs,
}

#[derive(Debug, Args)]
pub struct OneChargeArgs {
    pub state: Toggle,

    #[command(flatten)]
    pub write: WriteArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Charger host or URL
        #[arg(long)]
        host: String,

        #[arg(long, default_value = "admin")]
        username: String,

        #[arg(long, default_value = "16A")]
        model: String,

        /// Read the password from this environment variable at runtime
        #[arg(long)]
        password_env: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Show the current configuration (passwords redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        name: Option<String>,

        /// Password to store
        #[arg(long, env = "EVEUS_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
