//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SettingsLayer;

pub mod commands;

/// vrsync - Pull and push Aria Operations content between a project tree and a server
#[derive(Parser, Debug)]
#[command(name = "vrsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.vrsync/config.json)
    #[arg(long, global = true, env = "VRSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Stage everything but leave the project tree and the server untouched
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the content listed in content.yaml from the server into a project
    Export(ExportArgs),

    /// Push one or more packages to the server
    Import(ImportArgs),

    /// Show what a project contains and what its descriptor requests
    Status {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Project directory receiving the content
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Package descriptor (default: <project>/content.yaml)
    #[arg(long)]
    pub descriptor: Option<PathBuf>,

    /// Package name (default: project directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Package version
    #[arg(long, default_value = "0.0.0")]
    pub version: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Package archives (.zip) or expanded package directories
    #[arg(required = true)]
    pub packages: Vec<PathBuf>,

    /// Accepted for compatibility; packages of this type are never merged
    #[arg(long)]
    pub merge: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Server connection flags. Unset flags fall back to `VRSYNC_*`
/// variables, then the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Server host name
    #[arg(long)]
    pub host: Option<String>,

    /// Suite API port
    #[arg(long)]
    pub port: Option<u16>,

    /// Pre-acquired Suite API token
    #[arg(long)]
    pub token: Option<String>,

    /// SSH user for the command channel
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// SSH port for the command channel
    #[arg(long)]
    pub ssh_port: Option<u16>,

    /// Accept invalid TLS certificates and unknown SSH host keys
    #[arg(long)]
    pub insecure: bool,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory for staging workspaces (default: system temp dir)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,
}

impl ConnectionArgs {
    /// The flag layer of the settings resolution.
    #[must_use]
    pub fn to_layer(&self) -> SettingsLayer {
        SettingsLayer {
            host: self.host.clone(),
            port: self.port,
            token: self.token.clone(),
            ssh_user: self.ssh_user.clone(),
            ssh_port: self.ssh_port,
            insecure: self.insecure.then_some(true),
            timeout_secs: self.timeout,
            temp_dir: self.temp_dir.clone(),
        }
    }
}
