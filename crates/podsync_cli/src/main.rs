//! podsync CLI
//!
//! Command-line front end for the podcast subscription sync client.
//!
//! # Commands
//!
//! - `subscribe` / `unsubscribe` - Record local subscription changes
//! - `action` - Record an episode action (download, play, delete, new)
//! - `list` - Show the current subscription view
//! - `status` - Show cursors, pending changes, and action counts
//! - `compact` - Drop subscription tombstones
//! - `sync` - Run a sync round (demo mode against an in-process remote)

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Podcast subscription sync tools.
#[derive(Parser)]
#[command(name = "podsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the client state directory
    #[arg(global = true, short, long, default_value = ".podsync")]
    path: PathBuf,

    /// Device identifier reported to the service
    #[arg(global = true, short, long, default_value = "default-device")]
    device: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a feed URL
    Subscribe {
        /// Feed URL
        url: String,
    },

    /// Unsubscribe from a feed URL
    Unsubscribe {
        /// Feed URL
        url: String,
    },

    /// Record an episode action
    Action {
        /// Feed URL of the podcast
        podcast: String,

        /// Episode URL or GUID
        episode: String,

        /// Action kind (new, download, play, delete)
        kind: String,

        /// Play position in seconds (play actions only)
        #[arg(long)]
        position: Option<u64>,
    },

    /// Show the current subscription view
    List {
        /// Include tombstoned (removed) entries
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show cursors, pending changes, and action counts
    Status,

    /// Drop subscription tombstones
    Compact {
        /// Show what would be removed without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a sync round
    Sync {
        /// Sync against an in-process demo remote seeded with a few feeds
        #[arg(long)]
        demo: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Subscribe { url } => commands::subscribe::run(&cli.path, &url, true)?,
        Commands::Unsubscribe { url } => commands::subscribe::run(&cli.path, &url, false)?,
        Commands::Action {
            podcast,
            episode,
            kind,
            position,
        } => commands::action::run(&cli.path, &podcast, &episode, &kind, position)?,
        Commands::List { all, format } => commands::list::run(&cli.path, all, &format)?,
        Commands::Status => commands::status::run(&cli.path)?,
        Commands::Compact { dry_run } => commands::compact::run(&cli.path, dry_run)?,
        Commands::Sync { demo } => commands::sync::run(&cli.path, &cli.device, demo)?,
        Commands::Version => {
            println!("podsync v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
