//! Sync configuration
//!
//! Resolved in two layers:
//! 1. Optional TOML file (`--config` or `RATEIO_CONFIG`)
//! 2. Environment overrides (`RATEIO_SHEET_URL`, `RATEIO_SHEET_FILE`, ...)
//!
//! ```toml
//! on_missing = "INACTIVATE"
//!
//! [sheet]
//! url = "https://docs.google.com/spreadsheets/d/<id>/export?format=csv"
//! timeout_secs = 20
//! number_column = "Número"
//! name_column = "Colaborador"
//!
//! [line_numbers]
//! min_digits = 3
//! max_digits = 15
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::OnMissingPolicy;
use crate::sheet::{ColumnNames, CsvFileSource, HttpCsvSource, SheetSource};

pub const CONFIG_ENV: &str = "RATEIO_CONFIG";
pub const SHEET_URL_ENV: &str = "RATEIO_SHEET_URL";
pub const SHEET_FILE_ENV: &str = "RATEIO_SHEET_FILE";
pub const ON_MISSING_ENV: &str = "RATEIO_ON_MISSING";
pub const MIN_DIGITS_ENV: &str = "RATEIO_LINE_MIN_DIGITS";
pub const MAX_DIGITS_ENV: &str = "RATEIO_LINE_MAX_DIGITS";

/// Where the spreadsheet is read from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Published CSV export URL
    pub url: Option<String>,
    /// Local CSV export (used when no URL is set)
    pub file: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Header of the line number column, when auto-detection is not enough
    pub number_column: Option<String>,
    /// Header of the holder name column
    pub name_column: Option<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            timeout_secs: 20,
            number_column: None,
            name_column: None,
        }
    }
}

/// Format rule for line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LineNumberRules {
    pub min_digits: usize,
    pub max_digits: usize,
}

impl Default for LineNumberRules {
    fn default() -> Self {
        Self {
            min_digits: 3,
            // E.164 maximum
            max_digits: 15,
        }
    }
}

/// Full sync configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sheet: SheetConfig,
    pub line_numbers: LineNumberRules,
    /// Default policy for CLI applies that don't pass `--policy`
    pub on_missing: OnMissingPolicy,
}

impl SyncConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(env_path);

        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading sync config");
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid sync config: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(SHEET_URL_ENV) {
            self.sheet.url = Some(url);
        }
        if let Some(file) = lookup(SHEET_FILE_ENV) {
            self.sheet.file = Some(PathBuf::from(file));
        }
        if let Some(policy) = lookup(ON_MISSING_ENV) {
            self.on_missing = policy.parse().map_err(Error::Config)?;
        }
        if let Some(min) = lookup(MIN_DIGITS_ENV) {
            self.line_numbers.min_digits = parse_digits(MIN_DIGITS_ENV, &min)?;
        }
        if let Some(max) = lookup(MAX_DIGITS_ENV) {
            self.line_numbers.max_digits = parse_digits(MAX_DIGITS_ENV, &max)?;
        }

        self.check()
    }

    fn check(&self) -> Result<()> {
        let rules = &self.line_numbers;
        if rules.min_digits == 0 || rules.min_digits > rules.max_digits {
            return Err(Error::Config(format!(
                "Line number digits must satisfy 0 < min <= max (got min={}, max={})",
                rules.min_digits, rules.max_digits
            )));
        }
        Ok(())
    }

    /// Build the configured spreadsheet source
    ///
    /// A URL takes precedence over a file.
    pub fn build_source(&self) -> Result<Arc<dyn SheetSource>> {
        let columns = ColumnNames {
            number: self.sheet.number_column.clone(),
            name: self.sheet.name_column.clone(),
        };

        if let Some(url) = &self.sheet.url {
            let timeout = Duration::from_secs(self.sheet.timeout_secs.max(1));
            return Ok(Arc::new(HttpCsvSource::new(url, timeout, columns)?));
        }
        if let Some(file) = &self.sheet.file {
            return Ok(Arc::new(CsvFileSource::new(file, columns)));
        }

        Err(Error::Config(format!(
            "No spreadsheet configured. Set {} or {} (or [sheet] in the config file).",
            SHEET_URL_ENV, SHEET_FILE_ENV
        )))
    }
}

fn parse_digits(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.line_numbers.min_digits, 3);
        assert_eq!(config.line_numbers.max_digits, 15);
        assert_eq!(config.on_missing, OnMissingPolicy::Inactivate);
        assert!(config.build_source().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = SyncConfig::from_toml(
            r#"
            on_missing = "KEEP_ACTIVE"

            [sheet]
            file = "linhas.csv"
            name_column = "Colaborador"

            [line_numbers]
            min_digits = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.on_missing, OnMissingPolicy::KeepActive);
        assert_eq!(config.sheet.file, Some(PathBuf::from("linhas.csv")));
        assert_eq!(config.sheet.name_column.as_deref(), Some("Colaborador"));
        assert_eq!(config.sheet.timeout_secs, 20);
        assert_eq!(config.line_numbers.min_digits, 8);
        assert_eq!(config.line_numbers.max_digits, 15);
    }

    #[test]
    fn test_rejects_inverted_digit_bounds() {
        let result = SyncConfig::from_toml("[line_numbers]\nmin_digits = 20\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (SHEET_URL_ENV, "http://sheets.local/export.csv"),
            (ON_MISSING_ENV, "keep-active"),
            (MAX_DIGITS_ENV, "11"),
            (SHEET_FILE_ENV, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(
            config.sheet.url.as_deref(),
            Some("http://sheets.local/export.csv")
        );
        assert_eq!(config.sheet.file, None);
        assert_eq!(config.on_missing, OnMissingPolicy::KeepActive);
        assert_eq!(config.line_numbers.max_digits, 11);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = SyncConfig::default();
        let result = config.apply_overrides(|key| {
            (key == MIN_DIGITS_ENV).then(|| "four".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
