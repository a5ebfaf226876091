//! CLI module - Command-line interface for Rootmart
//!
//! Serving the API is the default; the other commands are maintenance
//! tasks that run once against the configured database and exit.

mod commands;

use clap::{Parser, Subcommand};

/// Rootmart - Android root module marketplace
/// Catalogue, ratings and release tracking for Magisk, KernelSU and APatch modules
#[derive(Parser)]
#[command(name = "rootmart")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API together with the background scheduler
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Run one GitHub release sync pass and exit
    #[command(alias = "s")]
    Sync,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create an admin account
    CreateAdmin {
        /// Login name
        username: String,
        /// Initial password
        password: String,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Delete activity log entries older than the retention window
    PruneLogs {
        /// Override `scheduler.log_retention_days`
        days: Option<u32>,
    },

    /// Show recent job runs
    #[command(alias = "j")]
    Jobs {
        /// Number of runs to show
        #[arg(default_value = "10")]
        limit: u64,
    },
}

pub use commands::*;
