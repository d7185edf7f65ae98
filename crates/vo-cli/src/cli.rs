use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vo",
    version,
    about = "Registry, reverse proxy, deploys and health for services on one host"
)]
pub struct Cli {
    /// Toolkit config file (YAML)
    #[arg(long, global = true, env = "VO_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Regenerate the proxy config or edit the service registry
    Proxy(ProxyArgs),
    /// Deploy, roll back or inspect a service
    Deploy(DeployArgs),
    /// Report service health
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct ProxyArgs {
    /// Print the generated config without writing files or reloading
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub action: Option<ProxyAction>,
}

#[derive(Debug, Subcommand)]
pub enum ProxyAction {
    /// List registered services
    List,
    /// Register a service and regenerate
    Add {
        name: String,
        port: u16,
        /// Forward the full path instead of stripping /<name>
        #[arg(long)]
        no_strip: bool,
        #[arg(long)]
        description: Option<String>,
        /// Path appended to the service URL for HTTP probes
        #[arg(long, value_name = "PATH")]
        health_path: Option<String>,
        /// Process-manager unit, when it differs from the service name
        #[arg(long)]
        unit: Option<String>,
        /// Account that owns the checkout and runs the process
        #[arg(long)]
        user: Option<String>,
    },
    /// Unregister a service and regenerate
    Remove { name: String },
    /// Toggle maintenance mode for a service
    Maint { name: String },
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    pub name: String,

    /// Show the live flag and process state without changing anything
    #[arg(long, conflicts_with_all = ["rollback", "health_check"])]
    pub status: bool,

    /// Reset to the previous commit, restart and re-check health
    #[arg(long)]
    pub rollback: bool,

    /// Shell command polled instead of the configured health check
    #[arg(long, value_name = "CMD")]
    pub health_check: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show one service in detail
    pub name: Option<String>,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}
