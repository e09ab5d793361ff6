//! Published spreadsheet source (CSV export over HTTP)

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{parse_sheet_csv, ColumnNames, SheetSource};
use crate::error::{Error, Result};
use crate::models::ExternalRow;

/// Downloads the spreadsheet's CSV export on every fetch
pub struct HttpCsvSource {
    client: reqwest::Client,
    url: String,
    columns: ColumnNames,
}

impl HttpCsvSource {
    pub fn new(url: &str, timeout: Duration, columns: ColumnNames) -> Result<Self> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Spreadsheet URL must be http(s): {}",
                url
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            columns,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SheetSource for HttpCsvSource {
    fn describe(&self) -> String {
        format!("url {}", self.url)
    }

    async fn fetch_rows(&self) -> Result<Vec<ExternalRow>> {
        debug!(url = %self.url, "Downloading spreadsheet");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, %status, "Spreadsheet download failed");
            // Server-side trouble is worth retrying; anything else needs fixing
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::Transient(format!(
                    "Spreadsheet returned HTTP {}",
                    status
                )));
            }
            return Err(Error::Import(format!(
                "Spreadsheet returned HTTP {}",
                status
            )));
        }

        let body = response.bytes().await?;
        parse_sheet_csv(body.as_ref(), &self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSheetServer;

    #[tokio::test]
    async fn test_downloads_csv() {
        let server = MockSheetServer::start("numero,nome\n555-0001,Alice\n").await;
        let source = HttpCsvSource::new(
            &server.csv_url(),
            Duration::from_secs(5),
            ColumnNames::default(),
        )
        .unwrap();

        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows, vec![ExternalRow::new(1, "555-0001", "Alice")]);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockSheetServer::start("").await;
        let source = HttpCsvSource::new(
            &server.failing_url(),
            Duration::from_secs(5),
            ColumnNames::default(),
        )
        .unwrap();

        let err = source.fetch_rows().await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_import_error() {
        let server = MockSheetServer::start("").await;
        let source = HttpCsvSource::new(
            &format!("{}/missing.csv", server.url()),
            Duration::from_secs(5),
            ColumnNames::default(),
        )
        .unwrap();

        let err = source.fetch_rows().await.unwrap_err();
        assert!(matches!(err, Error::Import(_)));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = HttpCsvSource::new(
            "ftp://example.com/x.csv",
            Duration::from_secs(5),
            ColumnNames::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
