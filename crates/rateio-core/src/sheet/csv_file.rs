//! Local CSV export source

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_sheet_csv, ColumnNames, SheetSource};
use crate::error::Result;
use crate::models::ExternalRow;

/// Reads the spreadsheet from a CSV file on disk
///
/// The file is re-read on every fetch so an operator can fix it between
/// previews.
pub struct CsvFileSource {
    path: PathBuf,
    columns: ColumnNames,
}

impl CsvFileSource {
    pub fn new(path: &Path, columns: ColumnNames) -> Self {
        Self {
            path: path.to_path_buf(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SheetSource for CsvFileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch_rows(&self) -> Result<Vec<ExternalRow>> {
        let bytes = tokio::fs::read(&self.path).await?;
        parse_sheet_csv(bytes.as_slice(), &self.columns)
    }
}
