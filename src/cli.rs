use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "assetbox")]
#[command(about = "assetbox CLI", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $ASSETBOX_CONFIG or config/assetbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every resource listed in a manifest
    Fetch(FetchArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// JSON manifest with `files` and optional `links`
    #[arg(long)]
    pub manifest: PathBuf,

    /// Base address for relative locations
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory finished payloads are written to
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum concurrent transfers
    #[arg(long)]
    pub max_parallel: Option<usize>,
}
