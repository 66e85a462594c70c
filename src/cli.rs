// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apostoli")]
#[command(about = "Staged remote deployment for containerized apps behind nginx")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output (CI mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON lines instead of human output
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub json: bool,

    /// Path to the configuration file (default: discovered in cwd)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Append a redacted record of the run to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new apostoli.yml configuration file
    Init {
        /// Repository URL to prefill
        repository: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Run the full deployment pipeline against the configured server
    Deploy,

    /// Remove everything the deployment created on the server
    Teardown {
        /// Confirm the teardown (required)
        #[arg(long)]
        yes: bool,
    },

    /// Run only the read-only post-deployment checks
    Check,
}
