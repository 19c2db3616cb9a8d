//! Clap derive structures for the `hmctl` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hmctl -- inspect and drive a HomeMatic CCU over its XML-RPC interfaces
#[derive(Debug, Parser)]
#[command(
    name = "hmctl",
    version,
    about = "Inspect and control HomeMatic CCU devices from the command line",
    long_about = "Talks to a HomeMatic CCU through its BidCos-Wired, BidCos-RF and\n\
        HomeMatic IP XML-RPC interfaces, resolving device names via the\n\
        controller's script endpoint.",
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
    /// CCU profile to use
    #[arg(long, short = 'p', env = "HMCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// CCU host name or address (overrides profile)
    #[arg(long, short = 'H', env = "HMCTL_HOST", global = true)]
    pub host: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HMCTL_OUTPUT",
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HMCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices and channels known to the controller
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// List the methods an interface supports
    Methods(MethodsArgs),

    /// Read one parameter of a channel's VALUES paramset
    Get(GetArgs),

    /// Write one parameter of a channel's VALUES paramset
    Set(SetArgs),

    /// Show the VALUES parameter descriptions of a channel
    Describe(AddressArgs),

    /// Show the full VALUES paramset of a channel
    Values(AddressArgs),

    /// Register for events and print value changes until interrupted
    Listen(ListenArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only show devices of this interface
    #[arg(long, short = 'i')]
    pub interface: Option<String>,

    /// Hide channels, showing only top-level devices
    #[arg(long)]
    pub no_channels: bool,
}

#[derive(Debug, Args)]
pub struct MethodsArgs {
    /// Interface id to query
    #[arg(long, short = 'i', default_value = "rf")]
    pub interface: String,
}

#[derive(Debug, Args)]
pub struct AddressArgs {
    /// Device or channel address (e.g. LEQ0000001:1)
    pub address: String,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Channel address
    pub address: String,

    /// Parameter name (e.g. STATE, LEVEL)
    pub parameter: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Channel address
    pub address: String,

    /// Parameter name
    pub parameter: String,

    /// New value
    pub value: String,

    /// How to encode the value on the wire
    #[arg(long = "type", short = 't', value_enum, default_value = "string")]
    pub value_type: ValueType,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValueType {
    String,
    Int,
    Bool,
    Double,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Callback server bind address (overrides profile)
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Only print events for these addresses
    #[arg(long, short = 'a')]
    pub address: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
