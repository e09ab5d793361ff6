//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_engine)
//! - `lines` - Stored lines, sync history and audit log listings
//! - `serve` - Web server command
//! - `status` - Status command
//! - `sync` - Sync preview and apply

pub mod core;
pub mod lines;
pub mod serve;
pub mod status;
pub mod sync;

// Re-export command functions for main.rs
pub use core::*;
pub use lines::*;
pub use serve::*;
pub use status::*;
pub use sync::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
