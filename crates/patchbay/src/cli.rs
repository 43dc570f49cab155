//! Clap derive structures for the `patchbay` CLI.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use patchbay_core::GroupKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// patchbay -- route NMOS devices from the command line or a Videohub panel
#[derive(Debug, Parser)]
#[command(
    name = "patchbay",
    version,
    about = "Route NMOS media devices through logical groups",
    long_about = "Discovers IS-04/IS-05 devices, patches operator-defined logical \
        sources onto logical receivers essence by essence, and can emulate a \
        Blackmagic Videohub so hardware panels drive the same routing.",
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
    /// Configuration file
    #[arg(long, env = "PATCHBAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PATCHBAY_OUTPUT",
        default_value = "table",
        global = true
    )]
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge: periodic discovery, patch dispatch and the emulator
    Serve(ServeArgs),

    /// Query every node now and list what was found
    Refresh(RefreshArgs),

    /// Manage logical sources and receivers
    #[command(alias = "g")]
    Groups(GroupsArgs),

    /// Route a logical source to a logical receiver
    Take {
        /// Source group ID
        source: u32,
        /// Receiver group ID
        receiver: u32,
    },

    /// Route one logical source to several logical receivers
    TakeMany {
        /// Source group ID
        source: u32,
        /// Receiver group IDs
        #[arg(required = true, num_args = 1..)]
        receivers: Vec<u32>,
    },

    /// Unbind every essence of a logical receiver
    Disconnect {
        /// Receiver group ID
        receiver: u32,
    },

    /// Show what a logical receiver is currently fed by
    Status {
        /// Receiver group ID
        receiver: u32,
    },

    /// Manage configured NMOS nodes
    #[command(alias = "n")]
    Nodes(NodesArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Run the Videohub emulator regardless of configuration
    #[arg(long)]
    pub emulator: bool,

    /// Emulator listen address
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Emulator TCP port
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Only list this side
    #[arg(long, value_enum)]
    pub only: Option<ResourceSide>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceSide {
    Senders,
    Receivers,
}

// ── Groups ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    #[value(alias = "source")]
    Sources,
    #[value(alias = "receiver")]
    Receivers,
}

impl From<KindArg> for GroupKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sources => Self::Sources,
            KindArg::Receivers => Self::Receivers,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    /// List groups sorted by ID
    #[command(alias = "ls")]
    List {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Create a group
    Add {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
        #[command(flatten)]
        fields: GroupFields,
    },

    /// Change a group; omitted fields keep their values
    Update {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        #[command(flatten)]
        fields: GroupFields,
    },

    /// Delete a group
    #[command(alias = "rm")]
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct GroupFields {
    /// Explicit numeric ID
    #[arg(long)]
    pub id: Option<u32>,

    /// Video device resource ID (empty string clears)
    #[arg(long)]
    pub video: Option<String>,

    /// Audio device resource ID (empty string clears)
    #[arg(long)]
    pub audio: Option<String>,

    /// Ancillary data device resource ID (empty string clears)
    #[arg(long)]
    pub data: Option<String>,
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub command: NodesCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodesCommand {
    /// List configured nodes
    #[command(alias = "ls")]
    List,

    /// Add a node to the configuration
    Add {
        name: String,
        /// Base URL, e.g. http://10.0.0.5:8080
        url: String,
        /// IS-04 node API version
        #[arg(long)]
        node_version: Option<String>,
        /// IS-05 connection API version
        #[arg(long)]
        connection_version: Option<String>,
        /// Detect the API versions the node answers on
        #[arg(long, conflicts_with_all = ["node_version", "connection_version"])]
        detect: bool,
    },

    /// Remove a node from the configuration
    #[command(alias = "rm")]
    Remove { name: String },

    /// Detect the API versions a node answers on it answers on
    Detect {
        /// Configured node name or base URL
        target: String,
    },
}
