//! Status command implementation

use std::path::Path;

use anyhow::Result;
use rateio_core::models::LineStatus;
use rateio_core::SyncConfig;

use super::open_db;

pub fn cmd_status(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    use rateio_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Rateio Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Spreadsheet source
    match SyncConfig::load(config_path).and_then(|c| c.build_source().map(|s| (c, s))) {
        Ok((config, source)) => {
            println!("   Sheet: {}", source.describe());
            println!(
                "   Line numbers: {}-{} digits, missing lines: {}",
                config.line_numbers.min_digits, config.line_numbers.max_digits, config.on_missing
            );
        }
        Err(e) => println!("   ❌ Sheet: {}", e),
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                let active = db.count_lines(Some(LineStatus::Active))?;
                let inactive = db.count_lines(Some(LineStatus::Inactive))?;
                println!();
                println!("   Active lines: {}", active);
                println!("   Inactive lines: {}", inactive);

                if let Some(run) = db.list_sync_runs(1)?.first() {
                    println!(
                        "   Last sync: {} by {} (+{} ~{} -{}, {} failed)",
                        run.created_at.format("%Y-%m-%d %H:%M"),
                        run.user,
                        run.inserted,
                        run.updated,
                        run.inactivated,
                        run.failed
                    );
                } else {
                    println!("   Last sync: never");
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
