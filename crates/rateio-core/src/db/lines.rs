//! Phone line operations
//!
//! Single-row writes are plain functions over a `Connection` so that
//! `Database::run_batch` can run them inside one transaction, each behind its
//! own savepoint.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Line, LineStatus};

const LINE_COLUMNS: &str = "id, line_number, full_name, status, created_at, updated_at";

fn row_to_line(row: &Row<'_>) -> rusqlite::Result<Line> {
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let updated_at_str: String = row.get(5)?;

    Ok(Line {
        id: row.get(0)?,
        line_number: row.get(1)?,
        full_name: row.get(2)?,
        status: status_str.parse().unwrap_or_default(),
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

/// How an activating write landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWrite {
    /// New row
    Inserted(i64),
    /// Existing inactive row brought back to active
    Reactivated(i64),
}

impl LineWrite {
    pub fn id(&self) -> i64 {
        match self {
            Self::Inserted(id) | Self::Reactivated(id) => *id,
        }
    }
}

/// Result of `Database::run_batch`
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// Values returned by the rows that committed, in input order
    pub committed: Vec<R>,
    /// Input index and error of each row that was rolled back
    pub failed: Vec<(usize, Error)>,
}

/// Make `line_number` an active line named `full_name`
///
/// Inserts a new row, or reactivates the row if it exists and is inactive.
/// An already-active row is a conflict.
pub(crate) fn activate_line(
    conn: &Connection,
    line_number: &str,
    full_name: &str,
) -> Result<LineWrite> {
    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, status FROM lines WHERE line_number = ?",
            params![line_number],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO lines (line_number, full_name, status) VALUES (?, ?, 'active')",
                params![line_number, full_name],
            )?;
            Ok(LineWrite::Inserted(conn.last_insert_rowid()))
        }
        Some((id, status)) if status == LineStatus::Inactive.as_str() => {
            conn.execute(
                r#"
                UPDATE lines
                SET full_name = ?, status = 'active', updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
                params![full_name, id],
            )?;
            info!(line_number, id, "Reactivated inactive line");
            Ok(LineWrite::Reactivated(id))
        }
        Some(_) => Err(Error::Conflict(format!(
            "Line {} is already active",
            line_number
        ))),
    }
}

/// Set the holder name of a line, leaving status untouched
pub(crate) fn rename_line(conn: &Connection, id: i64, full_name: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE lines SET full_name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![full_name, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("Line {} not found", id)));
    }
    Ok(())
}

/// Move a line to `status`
pub(crate) fn set_line_status(conn: &Connection, id: i64, status: LineStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE lines SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("Line {} not found", id)));
    }
    Ok(())
}

impl Database {
    /// List lines, optionally filtered by status, ordered by line number
    pub fn list_lines(&self, status: Option<LineStatus>) -> Result<Vec<Line>> {
        let conn = self.conn()?;

        let lines = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM lines WHERE status = ? ORDER BY line_number",
                    LINE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![status.as_str()], row_to_line)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM lines ORDER BY line_number",
                    LINE_COLUMNS
                ))?;
                let rows = stmt.query_map([], row_to_line)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(lines)
    }

    /// Count lines, optionally filtered by status
    pub fn count_lines(&self, status: Option<LineStatus>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM lines WHERE status = ?",
                params![status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Get a line by ID
    pub fn get_line(&self, id: i64) -> Result<Option<Line>> {
        let conn = self.conn()?;
        let line = conn
            .query_row(
                &format!("SELECT {} FROM lines WHERE id = ?", LINE_COLUMNS),
                params![id],
                row_to_line,
            )
            .optional()?;
        Ok(line)
    }

    /// Get a line by its number, whatever its status
    pub fn get_line_by_number(&self, line_number: &str) -> Result<Option<Line>> {
        let conn = self.conn()?;
        let line = conn
            .query_row(
                &format!("SELECT {} FROM lines WHERE line_number = ?", LINE_COLUMNS),
                params![line_number],
                row_to_line,
            )
            .optional()?;
        Ok(line)
    }

    /// Create (or reactivate) an active line
    pub fn create_line(&self, line_number: &str, full_name: &str) -> Result<LineWrite> {
        let conn = self.conn()?;
        activate_line(&conn, line_number, full_name)
    }

    /// Update a line's holder name
    pub fn update_line_name(&self, id: i64, full_name: &str) -> Result<()> {
        let conn = self.conn()?;
        rename_line(&conn, id, full_name)
    }

    /// Update a line's status
    pub fn update_line_status(&self, id: i64, status: LineStatus) -> Result<()> {
        let conn = self.conn()?;
        set_line_status(&conn, id, status)
    }

    /// Run `op` over `items` inside a single transaction
    ///
    /// Each row runs behind its own savepoint: a failing row is rolled back
    /// and reported, the others still commit.
    pub fn run_batch<T, R, F>(&self, items: &[T], mut op: F) -> Result<BatchOutcome<R>>
    where
        F: FnMut(&Connection, &T) -> Result<R>,
    {
        let mut outcome = BatchOutcome {
            committed: Vec::with_capacity(items.len()),
            failed: Vec::new(),
        };
        if items.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.conn()?;
        let mut tx = conn.transaction()?;

        for (index, item) in items.iter().enumerate() {
            let sp = tx.savepoint()?;
            match op(&*sp, item) {
                Ok(value) => {
                    sp.commit()?;
                    outcome.committed.push(value);
                }
                Err(e) => {
                    debug!(index, error = %e, "Batch row rolled back");
                    // Dropping the savepoint rolls the row back
                    drop(sp);
                    outcome.failed.push((index, e));
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }
}
