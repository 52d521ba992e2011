//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// Pelotari - zero-configuration LAN peer discovery
///
/// Broadcasts a discovery token on the local subnet, completes a three-way
/// UDP handshake with every node that answers, and prints the peer set as it
/// grows.
#[derive(Parser, Debug)]
#[command(name = "pelotari")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a discovery node until Ctrl+C
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "PELOTARI_CONFIG")]
        config: Option<String>,

        /// Override the maximum number of peers
        #[arg(long)]
        max_peers: Option<usize>,

        /// Override the discovery broadcast interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print each membership snapshot as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show the private IPv4 address and broadcast address discovery would use
    Interfaces {
        /// Only consider this interface
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    Init {
        /// Where to create the file (default: ~/.pelotari/node.toml)
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Check a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
