//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::{load_engine, open_db};

pub async fn cmd_serve(
    db_path: &Path,
    config_path: Option<&Path>,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting rateio web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let api_keys = rateio_server::parse_api_keys(
        &std::env::var(rateio_server::API_KEYS_ENV).unwrap_or_default(),
    );
    let allowed_origins = rateio_server::parse_origins(
        &std::env::var(rateio_server::ALLOWED_ORIGINS_ENV).unwrap_or_default(),
    );

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!(
            "   🔑 API keys: {} configured ({})",
            api_keys.len(),
            rateio_server::API_KEYS_ENV
        );
    }
    if !allowed_origins.is_empty() {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }

    let db = open_db(db_path, no_encrypt)?;
    let (engine, _) = load_engine(&db, config_path)?;
    println!("   Sheet: {}", engine.source().describe());
    println!();
    println!("   Press Ctrl+C to stop");

    let config = rateio_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        api_keys,
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    rateio_server::serve_with_config(db, engine, host, port, static_dir_str, config).await?;

    Ok(())
}
