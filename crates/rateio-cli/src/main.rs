//! Rateio CLI - Phone line reconciliation against the allocation spreadsheet
//!
//! Usage:
//!   rateio init                   Initialize database
//!   rateio sync preview           Show differences between sheet and stored lines
//!   rateio sync apply --all       Apply every difference
//!   rateio serve --port 3000      Start web server

mod cli;
mod commands;


use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, config_path, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                config_path,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
        Commands::Sync { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let (engine, config) = commands::load_engine(&db, config_path)?;
            match action {
                SyncAction::Preview { json } => commands::cmd_sync_preview(&engine, json).await,
                SyncAction::Apply {
                    policy,
                    all,
                    create,
                    update,
                    absent,
                    keep,
                    expected_hash,
                    json,
                } => {
                    let policy = match policy {
                        Some(p) => p.parse().map_err(|e: String| anyhow!(e))?,
                        None => config.on_missing,
                    };
                    let args = commands::ApplyArgs {
                        policy,
                        all,
                        create,
                        update,
                        absent,
                        keep,
                        expected_hash,
                        json,
                    };
                    commands::cmd_sync_apply(&db, &engine, args).await
                }
            }
        }
        Commands::Lines { status } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_lines(&db, status.as_deref())
        }
        Commands::Runs { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_runs(&db, limit)
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
    }
}
