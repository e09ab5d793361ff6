//! Spreadsheet sources
//!
//! The spreadsheet is the source of truth for which phone lines exist and who
//! holds them. Sources implement `SheetSource`:
//!
//! - `CsvFileSource` reads a local CSV export
//! - `HttpCsvSource` downloads a published CSV export
//! - `StaticSource` serves rows held in memory (tests, embedding)
//!
//! Rows come back raw: trimming and format checks are the sync engine's job.

use std::io::Read;

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::models::ExternalRow;

mod csv_file;
mod http;

pub use csv_file::CsvFileSource;
pub use http::HttpCsvSource;

/// Headers accepted for the line number column (compared after folding)
const NUMBER_HEADERS: &[&str] = &[
    "numero",
    "numerodalinha",
    "linha",
    "line",
    "linenumber",
    "telefone",
    "phone",
];

/// Headers accepted for the holder name column (compared after folding)
const NAME_HEADERS: &[&str] = &[
    "nome",
    "name",
    "nomecompleto",
    "fullname",
    "colaborador",
    "responsavel",
    "usuario",
];

/// Trait for spreadsheet sources
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Human-readable location, for logs and status output
    fn describe(&self) -> String;

    /// Read every data row
    async fn fetch_rows(&self) -> Result<Vec<ExternalRow>>;
}

/// Explicit column headers, overriding auto-detection
#[derive(Debug, Clone, Default)]
pub struct ColumnNames {
    pub number: Option<String>,
    pub name: Option<String>,
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<ExternalRow>,
}

impl StaticSource {
    pub fn new(rows: Vec<ExternalRow>) -> Self {
        Self { rows }
    }

    /// Build from `(line number, name)` pairs, numbering rows from 1
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let rows = pairs
            .iter()
            .enumerate()
            .map(|(i, (number, name))| ExternalRow::new(i + 1, *number, *name))
            .collect();
        Self { rows }
    }
}

#[async_trait]
impl SheetSource for StaticSource {
    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.rows.len())
    }

    async fn fetch_rows(&self) -> Result<Vec<ExternalRow>> {
        Ok(self.rows.clone())
    }
}

/// Fold a header for comparison: lowercase, accents stripped, separators removed
fn fold_header(header: &str) -> String {
    header
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.' | 'º' | '°'))
        .collect::<String>()
        .to_lowercase()
}

fn find_column(
    headers: &StringRecord,
    explicit: Option<&str>,
    candidates: &[&str],
    what: &str,
) -> Result<usize> {
    let folded: Vec<String> = headers.iter().map(fold_header).collect();

    if let Some(name) = explicit {
        let wanted = fold_header(name);
        return folded
            .iter()
            .position(|h| *h == wanted)
            .ok_or_else(|| Error::Import(format!("Column '{}' not found in sheet header", name)));
    }

    candidates
        .iter()
        .find_map(|candidate| folded.iter().position(|h| h == candidate))
        .ok_or_else(|| {
            Error::Import(format!(
                "Could not find a {} column in sheet header ({})",
                what,
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// CSV decoding failures are problems in the sheet itself, not the transport
fn unreadable(err: csv::Error) -> Error {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => Error::Io(e),
        _ => Error::Import(format!("Sheet could not be read: {}", message)),
    }
}

/// Parse a CSV export into sheet rows
///
/// Rows are numbered from 1 after the header. Fully blank rows (common at the
/// end of spreadsheet exports) are skipped but still consume a row number, so
/// reported positions match what the operator sees.
pub fn parse_sheet_csv<R: Read>(reader: R, columns: &ColumnNames) -> Result<Vec<ExternalRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(unreadable)?.clone();
    let number_col = find_column(
        &headers,
        columns.number.as_deref(),
        NUMBER_HEADERS,
        "line number",
    )?;
    let name_col = find_column(&headers, columns.name.as_deref(), NAME_HEADERS, "name")?;

    let mut rows = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(unreadable)?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        rows.push(ExternalRow::new(
            index + 1,
            record.get(number_col).unwrap_or_default(),
            record.get(name_col).unwrap_or_default(),
        ));
    }

    debug!(
        rows = rows.len(),
        number_col, name_col, "Parsed spreadsheet CSV"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detects_portuguese_headers() {
        let csv = "Número,Nome,Centro de Custo\n555-0001,Alice,TI\n555-0002,Bob,RH\n";
        let rows = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap();

        assert_eq!(
            rows,
            vec![
                ExternalRow::new(1, "555-0001", "Alice"),
                ExternalRow::new(2, "555-0002", "Bob"),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_cells_raw() {
        let csv = "line_number,name\n  555-0001 , Alice \n";
        let rows = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(rows[0].line_number, "  555-0001 ");
        assert_eq!(rows[0].name, " Alice ");
    }

    #[test]
    fn test_parse_blank_rows_keep_numbering() {
        let csv = "linha,colaborador\n100,A\n,\n200,B\n";
        let rows = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[1].line_number, "200");
    }

    #[test]
    fn test_parse_short_row_yields_empty_name() {
        let csv = "telefone,nome\n100\n";
        let rows = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(rows[0].name, "");
    }

    #[test]
    fn test_parse_explicit_columns() {
        let csv = "Linha Móvel,Titular\n100,A\n";
        let columns = ColumnNames {
            number: Some("linha movel".into()),
            name: Some("TITULAR".into()),
        };
        let rows = parse_sheet_csv(csv.as_bytes(), &columns).unwrap();
        assert_eq!(rows, vec![ExternalRow::new(1, "100", "A")]);
    }

    #[test]
    fn test_parse_missing_column() {
        let csv = "foo,bar\n1,2\n";
        let err = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, Error::Import(_)));
    }

    #[test]
    fn test_parse_decomposed_accents() {
        // macOS and LibreOffice exports may write "Número" as NFD
        let csv = "Nu\u{301}mero,Respons\u{e1}vel\n555-0001,Alice\n";
        let rows = parse_sheet_csv(csv.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(rows, vec![ExternalRow::new(1, "555-0001", "Alice")]);
    }

    #[test]
    fn test_fold_header() {
        assert_eq!(fold_header(" Nº da Linha "), "ndalinha");
        assert_eq!(fold_header("Nu\u{301}mero"), "numero");
        assert_eq!(fold_header("Full_Name"), "fullname");
    }

    #[test]
    fn test_parse_invalid_utf8_is_import_error() {
        let mut csv = b"numero,nome\n555-0001,".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = parse_sheet_csv(csv.as_slice(), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, Error::Import(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::from_pairs(&[("100", "A"), ("200", "B")]);
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows[1], ExternalRow::new(2, "200", "B"));
    }
}
