//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use vpstools_core::config::CONFIG_DIR_ENV;
use vpstools_core::{ClientAppType, ClientConfigFormat, ServiceStatus, ServiceType};

/// `VPSTools` command-line interface for managing a VPS fleet and its
/// proxy client configurations
#[derive(Parser)]
#[command(name = "vpstools")]
#[command(author, version, about = "VPSTools command-line interface")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = CONFIG_DIR_ENV)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage VPS instances
    #[command(subcommand, about = "Manage VPS instances in the fleet")]
    Vps(VpsCommands),

    /// Manage services deployed on an instance
    #[command(subcommand, about = "Manage services deployed on an instance")]
    Service(ServiceCommands),

    /// Manage proxy client configurations
    #[command(subcommand, about = "Manage and render proxy client configurations")]
    Config(ConfigCommands),

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    #[default]
    Table,
    /// JSON array
    Json,
}

/// VPS instance subcommands
#[derive(Subcommand)]
pub enum VpsCommands {
    /// List instances
    #[command(about = "List all instances, grouped")]
    List {
        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,

        /// Only show instances in this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Add an instance after a successful connection test
    #[command(about = "Add an instance; it is admitted only if it is reachable")]
    Add {
        /// Display name (defaults to the host)
        #[arg(short, long)]
        name: Option<String>,

        /// Hostname or IP address
        #[arg(short = 'H', long)]
        host: String,

        /// SSH port
        #[arg(short, long, default_value_t = 22)]
        port: u16,

        /// SSH login user
        #[arg(short, long)]
        user: String,

        /// Password (prompted for when neither --password nor --key is given)
        #[arg(long, conflicts_with = "key")]
        password: Option<String>,

        /// Path to SSH private key file
        #[arg(short, long)]
        key: Option<String>,

        /// Group bucket
        #[arg(short, long)]
        group: Option<String>,

        /// Tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Show instance details
    #[command(about = "Show instance details, services and telemetry")]
    Show {
        /// Instance name or UUID
        name: String,
    },

    /// Edit an instance
    #[command(about = "Update fields of an existing instance")]
    Edit {
        /// Instance name or UUID
        name: String,

        /// New display name
        #[arg(long)]
        new_name: Option<String>,

        /// New host
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// New SSH port
        #[arg(short, long)]
        port: Option<u16>,

        /// New login user
        #[arg(short, long)]
        user: Option<String>,

        /// Switch to password authentication
        #[arg(long, conflicts_with = "key")]
        password: Option<String>,

        /// Switch to key authentication
        #[arg(short, long)]
        key: Option<String>,

        /// New group
        #[arg(short, long)]
        group: Option<String>,

        /// Replacement tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
    },

    /// Delete an instance
    #[command(about = "Remove an instance from the fleet")]
    Delete {
        /// Instance name or UUID
        name: String,
    },

    /// Test connectivity
    #[command(about = "Probe reachability and SSH credentials")]
    Test {
        /// Instance name or UUID (use "all" to test the whole fleet)
        name: String,
    },

    /// Collect telemetry
    #[command(about = "Collect system telemetry from an instance")]
    Info {
        /// Instance name or UUID
        name: String,
    },
}

/// Service subcommands
#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Register a deployed service
    #[command(about = "Register a service deployed on an instance")]
    Add {
        /// Instance name or UUID
        vps: String,

        /// Service identifier, unique per instance
        #[arg(long)]
        id: String,

        /// Service type
        #[arg(short = 'T', long = "type")]
        service_type: ServiceType,

        /// Display name (defaults to the identifier)
        #[arg(short, long)]
        name: Option<String>,

        /// Listening port
        #[arg(short, long)]
        port: Option<u16>,

        /// Current status
        #[arg(short, long, default_value = "unknown")]
        status: ServiceStatus,
    },

    /// List services of an instance
    #[command(about = "List services registered on an instance")]
    List {
        /// Instance name or UUID
        vps: String,
    },
}

/// Client configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// List configurations
    #[command(about = "List registered client configurations")]
    List {
        /// Only configurations of this instance
        #[arg(long)]
        vps: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Import configurations from a JSON file
    #[command(about = "Register configurations from a JSON file (object or array)")]
    Import {
        /// Input file path
        file: PathBuf,
    },

    /// Import a share link
    #[command(about = "Register a configuration parsed from a share link")]
    ImportUri {
        /// Instance the endpoint belongs to
        vps: String,

        /// Share link (ss://, vmess://, vless://, trojan://, hysteria://, hysteria2://, tuic://)
        uri: String,
    },

    /// Render a client document
    #[command(about = "Render a configuration, or all of an instance's, to stdout")]
    Render {
        /// Configuration UUID, UUID prefix or tag; with --vps, an instance
        target: String,

        /// Treat the target as an instance and render all its configurations
        #[arg(long)]
        vps: bool,

        /// Document format (sing-box, clash, uri)
        #[arg(short, long)]
        format: ClientConfigFormat,

        /// Target client application (sing-box, sfa, sfi, clash-verge,
        /// clash-for-windows, stash, v2rayn, v2rayng, shadowrocket, nekobox)
        #[arg(short, long)]
        app: Option<ClientAppType>,
    },

    /// Print a share link
    #[command(about = "Print the share link of a configuration")]
    Url {
        /// Configuration UUID, UUID prefix or tag
        target: String,
    },

    /// Export a client document to a file
    #[command(about = "Render a configuration and write it to the export directory")]
    Export {
        /// Configuration UUID, UUID prefix or tag
        target: String,

        /// Document format (sing-box, clash, uri)
        #[arg(short, long)]
        format: ClientConfigFormat,

        /// Target client application (sing-box, sfa, sfi, clash-verge,
        /// clash-for-windows, stash, v2rayn, v2rayng, shadowrocket, nekobox)
        #[arg(short, long)]
        app: Option<ClientAppType>,

        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a configuration
    #[command(about = "Remove a configuration from the catalog")]
    Delete {
        /// Configuration UUID, UUID prefix or tag
        target: String,
    },

    /// List output formats and client applications
    #[command(about = "List the supported document formats and client applications")]
    Formats,
}
