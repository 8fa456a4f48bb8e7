//! VendorSync CLI
//!
//! Command-line tools for inspecting and driving VendorSync against a local
//! configuration file and a directory-backed remote store.
//!
//! # Commands
//!
//! - `inspect` - Compare local records with the remote store
//! - `push` - Push every local record
//! - `pull` - Import remote records and list conflicts
//! - `resolve` - Resolve one conflict
//! - `enable` / `disable` - Toggle sync

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// VendorSync command-line tools.
#[derive(Parser)]
#[command(name = "vendorsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local configuration file
    #[arg(global = true, short, long)]
    local: Option<PathBuf>,

    /// Path to the remote store directory
    #[arg(global = true, short, long)]
    remote: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare local records with the remote store
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Push every local record to the remote store
    Push,

    /// Import remote records and list conflicts
    Pull,

    /// Resolve the conflict for one record
    Resolve {
        /// Record id
        id: String,

        /// Which version to keep
        #[arg(short, long, value_enum)]
        keep: Keep,
    },

    /// Enable sync and push
    Enable,

    /// Disable sync
    Disable,
}

/// Side kept when resolving a conflict.
#[derive(Clone, Copy, ValueEnum)]
enum Keep {
    Local,
    Remote,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let local = cli.local.ok_or("Local configuration path required (--local)")?;
    let remote = cli.remote.ok_or("Remote store path required (--remote)")?;
    let stores = commands::Stores::open(&local, &remote)?;

    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&stores, &format)?,
        Commands::Push => commands::sync::push(&stores).await?,
        Commands::Pull => commands::sync::pull(&stores).await?,
        Commands::Resolve { id, keep } => {
            commands::resolve::run(&stores, &id, matches!(keep, Keep::Local)).await?
        }
        Commands::Enable => commands::enable::run(&stores, true).await?,
        Commands::Disable => commands::enable::run(&stores, false).await?,
    }

    Ok(())
}
