//! Executes an approved subset of a diff

use tracing::{info, warn};

use crate::db::{activate_line, rename_line, set_line_status, BatchOutcome, Database, LineWrite};
use crate::error::{Error, Result};
use crate::models::{
    ApplyResult, Diff, DiffKind, LineStatus, OnMissingPolicy, RowFailure, Selection,
};

/// Selected diffs, split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub creates: Vec<Diff>,
    pub updates: Vec<Diff>,
    pub absents: Vec<Diff>,
}

impl ApplyPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.absents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.absents.len()
    }
}

/// Keep the diffs `selection` approves; `None` approves everything
pub fn plan(diffs: &[Diff], selection: Option<&Selection>) -> ApplyPlan {
    let mut plan = ApplyPlan::default();
    for diff in diffs {
        if let Some(selection) = selection {
            if !selection.selects(diff) {
                continue;
            }
        }
        match diff.kind {
            DiffKind::Create => plan.creates.push(diff.clone()),
            DiffKind::Update => plan.updates.push(diff.clone()),
            DiffKind::AbsentFromSheet => plan.absents.push(diff.clone()),
        }
    }
    plan
}

/// Write `plan` to the database, one transaction per kind
///
/// Row failures are collected into the result. The call only fails when no
/// batch could be opened at all.
pub fn execute(db: &Database, plan: &ApplyPlan, policy: OnMissingPolicy) -> Result<ApplyResult> {
    let mut result = ApplyResult::default();
    let mut batch_error: Option<Error> = None;

    let creates = db.run_batch(&plan.creates, |conn, diff| {
        activate_line(conn, &diff.line_number, external_name(diff)?)
    });
    if let Some(writes) = settle(&plan.creates, creates, &mut result, &mut batch_error) {
        let reactivated = writes
            .iter()
            .filter(|w| matches!(w, LineWrite::Reactivated(_)))
            .count();
        if reactivated > 0 {
            info!(reactivated, "Reactivated lines that returned to the sheet");
        }
        result.inserted = writes.len();
    }

    let updates = db.run_batch(&plan.updates, |conn, diff| {
        rename_line(conn, stored_id(diff)?, external_name(diff)?)
    });
    if let Some(writes) = settle(&plan.updates, updates, &mut result, &mut batch_error) {
        result.updated = writes.len();
    }

    match policy {
        OnMissingPolicy::Inactivate => {
            let absents = db.run_batch(&plan.absents, |conn, diff| {
                set_line_status(conn, stored_id(diff)?, LineStatus::Inactive)
            });
            if let Some(writes) = settle(&plan.absents, absents, &mut result, &mut batch_error) {
                result.inactivated = writes.len();
            }
        }
        OnMissingPolicy::KeepActive => {
            result.kept_active = plan.absents.len();
        }
    }

    result.total = result.inserted + result.updated + result.inactivated + result.kept_active;

    if let Some(e) = batch_error {
        if result.inserted + result.updated + result.inactivated == 0 {
            return Err(Error::Transient(format!("database unavailable: {}", e)));
        }
    }

    info!(
        inserted = result.inserted,
        updated = result.updated,
        inactivated = result.inactivated,
        kept_active = result.kept_active,
        failed = result.failures.len(),
        "Applied sync"
    );

    Ok(result)
}

/// Fold one batch into `result`, returning the committed values
fn settle<R>(
    diffs: &[Diff],
    outcome: Result<BatchOutcome<R>>,
    result: &mut ApplyResult,
    batch_error: &mut Option<Error>,
) -> Option<Vec<R>> {
    match outcome {
        Ok(outcome) => {
            for (index, e) in outcome.failed {
                let diff = &diffs[index];
                warn!(line_number = %diff.line_number, kind = %diff.kind, error = %e, "Row failed");
                result.failures.push(failure(diff, &e));
            }
            Some(outcome.committed)
        }
        Err(e) => {
            warn!(rows = diffs.len(), error = %e, "Batch failed");
            result
                .failures
                .extend(diffs.iter().map(|diff| failure(diff, &e)));
            batch_error.get_or_insert(e);
            None
        }
    }
}

fn failure(diff: &Diff, error: &Error) -> RowFailure {
    RowFailure {
        line_number: diff.line_number.clone(),
        kind: diff.kind,
        error: error.to_string(),
    }
}

fn external_name(diff: &Diff) -> Result<&str> {
    diff.external_view
        .as_ref()
        .map(|v| v.name.as_str())
        .ok_or_else(|| {
            Error::InvalidData(format!("{} {} has no sheet values", diff.kind, diff.line_number))
        })
}

fn stored_id(diff: &Diff) -> Result<i64> {
    diff.stored_view.as_ref().map(|v| v.id).ok_or_else(|| {
        Error::InvalidData(format!("{} {} has no stored line", diff.kind, diff.line_number))
    })
}
