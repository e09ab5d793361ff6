//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_engine` - Build the sync engine from config
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use rateio_core::{db::Database, SyncConfig, SyncEngine};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load the sync config and build an engine over `db`
pub fn load_engine(db: &Database, config_path: Option<&Path>) -> Result<(SyncEngine, SyncConfig)> {
    let config = SyncConfig::load(config_path).context("Failed to load sync config")?;
    let source = config
        .build_source()
        .context("Failed to set up spreadsheet source")?;
    let engine = SyncEngine::new(db.clone(), source, config.line_numbers);
    Ok((engine, config))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let lines = db.count_lines(None)?;
    println!("   Lines stored: {}", lines);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Point at the sheet: export RATEIO_SHEET_URL=<published CSV URL>");
    println!("  2. Review differences: rateio sync preview");
    println!("  3. Apply them: rateio sync apply --all");

    Ok(())
}
