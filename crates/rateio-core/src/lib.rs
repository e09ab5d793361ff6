//! Rateio Core Library
//!
//! Shared functionality for the rateio line-sync service:
//! - Database access and migrations (phone lines, sync history, audit log)
//! - Spreadsheet sources (local CSV export or published CSV over HTTP)
//! - Sync engine: validation, diffing, and selective apply
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sheet;
pub mod sync;

/// Test utilities including a mock spreadsheet server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{LineNumberRules, SheetConfig, SyncConfig};
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use sheet::{ColumnNames, CsvFileSource, HttpCsvSource, SheetSource, StaticSource};
pub use sync::SyncEngine;
