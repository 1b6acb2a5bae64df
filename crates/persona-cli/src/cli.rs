use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "persona",
    about = "Persona profiles: create, share, and count who loads them",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Create a profile in a local data directory
    Create(CreateArgs),
    /// Load a profile, counting one interaction
    Show(ShowArgs),
    /// Show a profile's counters without counting an interaction
    Stats(StatsArgs),
    /// Print the effective server configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides the config file)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Directory for the durable store (overrides the config file)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub data_dir: PathBuf,
    /// Explicit profile key; a random one is generated otherwise
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long)]
    pub owner: Option<String>,
    /// Profile payload as a JSON document
    pub payload: String,
}

#[derive(Args)]
pub struct ShowArgs {
    #[arg(long)]
    pub data_dir: PathBuf,
    pub key: String,
    /// Viewer identity; an anonymous one is generated otherwise
    #[arg(long)]
    pub viewer: Option<String>,
}

#[derive(Args)]
pub struct StatsArgs {
    #[arg(long)]
    pub data_dir: PathBuf,
    pub key: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Read this file instead of printing the defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}
