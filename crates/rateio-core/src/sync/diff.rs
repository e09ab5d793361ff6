//! Set-difference between sheet rows and active stored lines

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::models::{Diff, DiffKind, ExternalRow, ExternalView, Line, LineStatus, StoredView};

/// Classify every key present on either side
///
/// `external` must already be validated (normalized, no duplicates). Inactive
/// entries in `stored` are ignored, so a key that came back to the sheet is a
/// `Create`. Output is ordered by kind, then line number.
pub fn compute_diffs(external: &[ExternalRow], stored: &[Line]) -> Vec<Diff> {
    let sheet: BTreeMap<&str, &ExternalRow> = external
        .iter()
        .map(|row| (row.line_number.as_str(), row))
        .collect();
    let active: BTreeMap<&str, &Line> = stored
        .iter()
        .filter(|line| line.status == LineStatus::Active)
        .map(|line| (line.line_number.as_str(), line))
        .collect();

    let mut diffs = Vec::new();

    for (key, row) in &sheet {
        match active.get(key) {
            None => diffs.push(Diff {
                line_number: key.to_string(),
                kind: DiffKind::Create,
                external_view: Some(ExternalView {
                    name: row.name.clone(),
                }),
                stored_view: None,
            }),
            Some(line) if line.full_name.as_deref() != Some(row.name.as_str()) => {
                diffs.push(Diff {
                    line_number: key.to_string(),
                    kind: DiffKind::Update,
                    external_view: Some(ExternalView {
                        name: row.name.clone(),
                    }),
                    stored_view: Some(stored_view(line)),
                })
            }
            Some(_) => {}
        }
    }

    for (key, line) in &active {
        if !sheet.contains_key(key) {
            diffs.push(Diff {
                line_number: key.to_string(),
                kind: DiffKind::AbsentFromSheet,
                external_view: None,
                stored_view: Some(stored_view(line)),
            });
        }
    }

    diffs.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    diffs
}

fn stored_view(line: &Line) -> StoredView {
    StoredView {
        id: line.id,
        full_name: line.full_name.clone(),
        status: line.status,
    }
}

/// SHA-256 over the normalized rows, independent of sheet row order
pub fn fingerprint(rows: &[ExternalRow]) -> String {
    let mut sorted: Vec<&ExternalRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.line_number.cmp(&b.line_number));

    let mut hasher = Sha256::new();
    for row in sorted {
        hasher.update(row.line_number.as_bytes());
        hasher.update([0x1f]);
        hasher.update(row.name.as_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}
