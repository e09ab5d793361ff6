//! Error types for rateio

use thiserror::Error;

use crate::models::{ApplyResult, ValidationReport};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The spreadsheet has rows the operator must fix before a diff is computed
    #[error("Validation error: {0}")]
    Validation(ValidationReport),

    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Spreadsheet or database unreachable; safe to retry
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Some rows failed to write; the rest were committed
    #[error("Partial apply: {} row(s) failed", .0.failures.len())]
    PartialApply(Box<ApplyResult>),
}

impl Error {
    /// Reclassify connectivity failures from `what` as transient
    ///
    /// Anything that is not a connectivity problem (bad CSV, validation, etc.)
    /// is returned unchanged.
    pub fn into_transient(self, what: &str) -> Self {
        let transient = match &self {
            Error::Http(_) | Error::Io(_) | Error::Pool(_) => true,
            Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
            ),
            _ => false,
        };

        if transient {
            Error::Transient(format!("{} unavailable: {}", what, self))
        } else {
            self
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
