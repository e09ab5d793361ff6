//! Spreadsheet row validation
//!
//! Line numbers are normalized by trimming surrounding whitespace only; the
//! trimmed value is the join key against stored lines.

use std::collections::HashMap;

use regex::Regex;

use crate::config::LineNumberRules;
use crate::error::Result;
use crate::models::{DuplicateKey, EmptyName, ExternalRow, InvalidRow, ValidationReport};

/// Optional `+`, then digits and the usual separators, ending on a digit
const LINE_NUMBER_PATTERN: &str = r"^\+?[0-9(][0-9()\-. ]*[0-9]$";

/// Normalize a raw line number cell into the join key
pub fn normalize_line_number(raw: &str) -> String {
    raw.trim().to_string()
}

/// Compiled line number format rule
pub struct LineNumberFormat {
    pattern: Regex,
    rules: LineNumberRules,
}

impl LineNumberFormat {
    pub fn new(rules: &LineNumberRules) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(LINE_NUMBER_PATTERN)?,
            rules: *rules,
        })
    }

    /// Check an already-normalized line number
    pub fn is_valid(&self, value: &str) -> bool {
        if !self.pattern.is_match(value) {
            return false;
        }
        let digits = value.chars().filter(char::is_ascii_digit).count();
        (self.rules.min_digits..=self.rules.max_digits).contains(&digits)
    }
}

/// Rows that passed the format check, plus everything found along the way
#[derive(Debug)]
pub struct ValidatedSheet {
    /// Rows with a valid, normalized line number
    pub rows: Vec<ExternalRow>,
    pub report: ValidationReport,
}

/// Normalize and check sheet rows
///
/// Never fails on bad data: problems go into the report, and the caller
/// decides whether `report.is_blocking()`.
pub fn validate_rows(rows: Vec<ExternalRow>, rules: &LineNumberRules) -> Result<ValidatedSheet> {
    let format = LineNumberFormat::new(rules)?;
    let mut report = ValidationReport::default();
    let mut valid = Vec::with_capacity(rows.len());

    // key -> index into `groups`, to keep first-appearance order
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();

    for row in rows {
        let key = normalize_line_number(&row.line_number);

        if row.name.trim().is_empty() {
            report.empty_names.push(EmptyName {
                line: row.line,
                line_number: key.clone(),
            });
        }

        if !format.is_valid(&key) {
            report.invalid_rows.push(InvalidRow {
                line: row.line,
                value: row.line_number,
            });
            continue;
        }

        match seen.get(&key) {
            Some(&group) => groups[group].1.push(row.line),
            None => {
                seen.insert(key.clone(), groups.len());
                groups.push((key.clone(), vec![row.line]));
            }
        }

        valid.push(ExternalRow {
            line: row.line,
            line_number: key,
            name: row.name,
        });
    }

    report.duplicates = groups
        .into_iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|(numero, mut lines)| {
            lines.sort_unstable();
            DuplicateKey { numero, lines }
        })
        .collect();

    Ok(ValidatedSheet {
        rows: valid,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> LineNumberRules {
        LineNumberRules::default()
    }

    fn validate(pairs: &[(&str, &str)]) -> ValidatedSheet {
        let rows = pairs
            .iter()
            .enumerate()
            .map(|(i, (n, name))| ExternalRow::new(i + 1, *n, *name))
            .collect();
        validate_rows(rows, &rules()).unwrap()
    }

    #[test]
    fn test_format_accepts_common_shapes() {
        let format = LineNumberFormat::new(&rules()).unwrap();
        for value in [
            "555-0001",
            "(11) 98765-4321",
            "+55 11 98765-4321",
            "11.3333.4444",
            "1000",
        ] {
            assert!(format.is_valid(value), "{} should be valid", value);
        }
    }

    #[test]
    fn test_format_rejects_garbage() {
        let format = LineNumberFormat::new(&rules()).unwrap();
        for value in ["", "abc", "555-000x", "12", "555-", "+", "1234567890123456"] {
            assert!(!format.is_valid(value), "{} should be invalid", value);
        }
    }

    #[test]
    fn test_duplicates_are_reported_with_all_lines() {
        let sheet = validate(&[("100-0", "A"), ("200-0", "X"), ("100-0", "B")]);
        assert!(sheet.report.is_blocking());
        assert_eq!(
            sheet.report.duplicates,
            vec![DuplicateKey {
                numero: "100-0".into(),
                lines: vec![1, 3],
            }]
        );
    }

    #[test]
    fn test_duplicates_match_after_trimming() {
        let sheet = validate(&[("5550001", "A"), (" 5550001 ", "B")]);
        assert_eq!(sheet.report.duplicates.len(), 1);
        assert_eq!(sheet.report.duplicates[0].numero, "5550001");
        assert_eq!(sheet.report.duplicates[0].lines, vec![1, 2]);
    }

    #[test]
    fn test_invalid_rows_keep_raw_value() {
        let sheet = validate(&[("555-0001", "A"), (" n/a ", "B")]);
        assert!(sheet.report.is_blocking());
        assert_eq!(
            sheet.report.invalid_rows,
            vec![InvalidRow {
                line: 2,
                value: " n/a ".into(),
            }]
        );
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn test_empty_names_are_warnings() {
        let sheet = validate(&[("555-0001", "  "), ("555-0002", "Bob")]);
        assert!(!sheet.report.is_blocking());
        assert_eq!(
            sheet.report.empty_names,
            vec![EmptyName {
                line: 1,
                line_number: "555-0001".into(),
            }]
        );
        assert_eq!(sheet.rows.len(), 2);
    }

    #[test]
    fn test_rows_are_normalized_but_names_untouched() {
        let sheet = validate(&[(" 555-0001\t", " Alice ")]);
        assert_eq!(sheet.rows[0].line_number, "555-0001");
        assert_eq!(sheet.rows[0].name, " Alice ");
    }

    #[test]
    fn test_custom_digit_bounds() {
        let rules = LineNumberRules {
            min_digits: 10,
            max_digits: 11,
        };
        let format = LineNumberFormat::new(&rules).unwrap();
        assert!(format.is_valid("(11) 98765-4321"));
        assert!(!format.is_valid("555-0001"));
    }
}
