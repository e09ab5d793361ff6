//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Rateio - Keep phone lines in sync with the allocation spreadsheet
#[derive(Parser)]
#[command(name = "rateio")]
#[command(about = "Reconcile phone lines against the allocation spreadsheet", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "rateio.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set RATEIO_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Sync config file (TOML); defaults to RATEIO_CONFIG if set
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database and spreadsheet status
    Status,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer API key (RATEIO_API_KEYS).
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Compare the spreadsheet with stored lines, and apply the differences
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// List stored lines
    Lines {
        /// Filter by status: active, inactive
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show applied sync history
    Runs {
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show what would change, without writing anything
    Preview {
        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply selected differences
    ///
    /// Pass --all to apply every difference, or pick line numbers per kind.
    /// Line numbers given to --keep are never applied.
    Apply {
        /// What to do with lines missing from the sheet: INACTIVATE, KEEP_ACTIVE
        /// (defaults to the config's on_missing)
        #[arg(long)]
        policy: Option<String>,

        /// Apply every difference
        #[arg(long)]
        all: bool,

        /// Line numbers to create
        #[arg(long, value_delimiter = ',')]
        create: Vec<String>,

        /// Line numbers whose holder name should be updated
        #[arg(long, value_delimiter = ',')]
        update: Vec<String>,

        /// Line numbers missing from the sheet to apply the policy to
        #[arg(long, value_delimiter = ',')]
        absent: Vec<String>,

        /// Line numbers to leave untouched
        #[arg(long, value_delimiter = ',')]
        keep: Vec<String>,

        /// Refuse to apply unless the sheet still matches this preview hash
        #[arg(long)]
        expected_hash: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}
