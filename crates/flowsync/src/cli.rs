//! Clap derive structures for the `flowsync` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use flowsync_core::Direction;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// flowsync -- reconcile media flow tables against provisioning
#[derive(Debug, Parser)]
#[command(
    name = "flowsync",
    version,
    about = "Reconcile RX/TX media flow tables with remote provisioning",
    long_about = "Drives the flow reconciliation engine against a JSON table file.\n\n\
        Replays provisioning calls, applies operator edits and discovery\n\
        samples, and lists the resulting flow, pair and interface tables.",
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
    /// Managed element to operate on
    #[arg(long, short = 'e', env = "FLOWSYNC_ELEMENT", global = true)]
    pub element: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long = "config", short = 'C', env = "FLOWSYNC_CONFIG_FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Table store file (overrides the element profile)
    #[arg(long, short = 't', env = "FLOWSYNC_TABLES", global = true)]
    pub tables: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLOWSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    /// Incoming flows
    Rx,
    /// Outgoing flows
    Tx,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Rx => Self::Rx,
            DirectionArg::Tx => Self::Tx,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply provisioning calls from a file (one JSON call per line)
    Replay {
        /// File of inter-app calls, `-` for stdin
        file: PathBuf,
    },

    /// List incoming or outgoing flows
    #[command(alias = "ls")]
    Flows {
        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// List provisioned RX/TX pairs
    Provisioned,

    /// List interfaces with aggregated flow statistics
    #[command(alias = "intf")]
    Interfaces,

    /// Wait for the element's interface table, then load it
    Bootstrap,

    /// Set the expected bitrate of a flow (negative clears it)
    SetExpected {
        #[arg(value_enum)]
        direction: DirectionArg,
        /// Flow instance key
        key: String,
        /// Expected bitrate in bps
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Delete a single flow row
    DeleteFlow {
        #[arg(value_enum)]
        direction: DirectionArg,
        /// Flow instance key
        key: String,
    },

    /// Tear down a provisioned pair by id
    DeleteProvisioned {
        /// Provisioned flow id (UUID)
        id: String,
    },

    /// Merge a discovery pass from a samples file
    Observe {
        /// JSON file with `rx` and `tx` sample arrays
        file: PathBuf,
    },

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration as TOML
    Show,
}
