use clap::{Parser, Subcommand};
use libgitmirror_core::CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gitmirror",
    about = "Mirror a path-filtered subset of a repository's history",
    version
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Override the standard repository path
    #[arg(long, global = true)]
    pub standard: Option<PathBuf>,

    /// Override the mirror repository path
    #[arg(long, global = true)]
    pub mirror: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a new configuration file
    Init {
        /// Allowed folder (repeatable)
        #[arg(long = "folder")]
        folders: Vec<String>,

        /// Allowed individual file (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,

        /// Mirror remote to push to after each run
        #[arg(long)]
        remote: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Mirror standard history from ROOT up to the configured ref
    Run {
        /// First standard commit to mirror (hash or revision)
        root: String,
    },

    /// Show the replay plan for ROOT without changing anything
    Plan {
        /// First standard commit to mirror (hash or revision)
        root: String,
    },

    /// Show mirrored-commit count and mirror branches
    Status,
}
