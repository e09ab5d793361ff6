//! Spreadsheet reconciliation
//!
//! A sync has two steps:
//! 1. `preview` reads the sheet and the active lines and classifies every key
//!    as CREATE, UPDATE or ABSENT_FROM_SHEET
//! 2. `apply` recomputes that diff and writes the subset the operator approved
//!
//! Nothing is cached between the two; apply always works from a fresh read.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::LineNumberRules;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    ApplyRequest, ApplyResult, Caller, Diff, LineStatus, SyncPreview, SyncSummary, SyncWarnings,
};
use crate::sheet::SheetSource;

mod apply;
mod diff;
mod validate;

pub use apply::{execute, plan, ApplyPlan};
pub use diff::{compute_diffs, fingerprint};
pub use validate::{normalize_line_number, validate_rows, LineNumberFormat, ValidatedSheet};

/// A diff computed from a fresh read of both sides
struct Snapshot {
    diffs: Vec<Diff>,
    warnings: SyncWarnings,
    source_hash: String,
}

/// Preview and apply against one sheet and one database
#[derive(Clone)]
pub struct SyncEngine {
    db: Database,
    source: Arc<dyn SheetSource>,
    rules: LineNumberRules,
}

impl SyncEngine {
    pub fn new(db: Database, source: Arc<dyn SheetSource>, rules: LineNumberRules) -> Self {
        Self { db, source, rules }
    }

    pub fn source(&self) -> &Arc<dyn SheetSource> {
        &self.source
    }

    pub fn rules(&self) -> &LineNumberRules {
        &self.rules
    }

    /// Compute the diff without writing anything
    pub async fn preview(&self) -> Result<SyncPreview> {
        let snapshot = self.snapshot().await?;
        let summary = SyncSummary::from_diffs(&snapshot.diffs);

        debug!(
            criar = summary.create,
            atualizar = summary.update,
            ausentes = summary.absent,
            "Sync preview"
        );

        let warnings = (!snapshot.warnings.empty_names.is_empty()).then_some(snapshot.warnings);

        Ok(SyncPreview {
            diffs: snapshot.diffs,
            summary,
            warnings,
            source_hash: snapshot.source_hash,
        })
    }

    /// Recompute the diff and write the approved subset
    ///
    /// Row-level write failures are reported in `ApplyResult::failures`, not
    /// as an error.
    pub async fn apply(&self, request: &ApplyRequest, caller: &Caller) -> Result<ApplyResult> {
        if !caller.role.can_apply() {
            return Err(Error::Authorization(format!(
                "Role '{}' cannot apply syncs",
                caller.role
            )));
        }

        let snapshot = self.snapshot().await?;

        if let Some(expected) = &request.expected_hash {
            if *expected != snapshot.source_hash {
                return Err(Error::Conflict(
                    "Spreadsheet changed since preview; preview again before applying".into(),
                ));
            }
        }

        let plan = plan(&snapshot.diffs, request.selection.as_ref());
        if plan.is_empty() {
            info!(user = %caller.user, "Nothing selected to apply");
            return Ok(ApplyResult::default());
        }

        let result = execute(&self.db, &plan, request.on_missing)?;

        if let Err(e) =
            self.db
                .record_sync_run(&caller.user, request.on_missing, &result, &snapshot.source_hash)
        {
            warn!(error = %e, "Failed to record sync run");
        }

        Ok(result)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let rows = self
            .source
            .fetch_rows()
            .await
            .map_err(|e| e.into_transient("spreadsheet"))?;

        let sheet = validate_rows(rows, &self.rules)?;
        if sheet.report.is_blocking() {
            info!(report = %sheet.report, "Spreadsheet failed validation");
            return Err(Error::Validation(sheet.report));
        }

        let stored = self
            .db
            .list_lines(Some(LineStatus::Active))
            .map_err(|e| e.into_transient("database"))?;

        Ok(Snapshot {
            diffs: compute_diffs(&sheet.rows, &stored),
            source_hash: fingerprint(&sheet.rows),
            warnings: SyncWarnings {
                empty_names: sheet.report.empty_names,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiffKind, Role, Selection};
    use crate::sheet::StaticSource;

    fn engine(db: &Database, pairs: &[(&str, &str)]) -> SyncEngine {
        SyncEngine::new(
            db.clone(),
            Arc::new(StaticSource::from_pairs(pairs)),
            LineNumberRules::default(),
        )
    }

    fn admin() -> Caller {
        Caller::new("admin@example.com", Role::Admin)
    }

    #[tokio::test]
    async fn test_preview_reports_empty_names() {
        let db = Database::in_memory().unwrap();
        let preview = engine(&db, &[("555-0001", ""), ("555-0002", "Bob")])
            .preview()
            .await
            .unwrap();

        assert_eq!(preview.summary.create, 2);
        let warnings = preview.warnings.unwrap();
        assert_eq!(warnings.empty_names.len(), 1);
        assert_eq!(warnings.empty_names[0].line, 1);
    }

    #[tokio::test]
    async fn test_preview_without_warnings_omits_them() {
        let db = Database::in_memory().unwrap();
        let preview = engine(&db, &[("555-0001", "Alice")]).preview().await.unwrap();
        assert!(preview.warnings.is_none());
    }

    #[tokio::test]
    async fn test_viewer_cannot_apply() {
        let db = Database::in_memory().unwrap();
        let err = engine(&db, &[("555-0001", "Alice")])
            .apply(
                &ApplyRequest::default(),
                &Caller::new("viewer@example.com", Role::Viewer),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authorization(_)));
        assert_eq!(db.count_lines(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_rejects_stale_hash() {
        let db = Database::in_memory().unwrap();
        let request = ApplyRequest {
            expected_hash: Some("0".repeat(64)),
            ..Default::default()
        };
        let err = engine(&db, &[("555-0001", "Alice")])
            .apply(&request, &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_apply_with_matching_hash_records_run() {
        let db = Database::in_memory().unwrap();
        let engine = engine(&db, &[("555-0001", "Alice")]);
        let preview = engine.preview().await.unwrap();

        let request = ApplyRequest {
            expected_hash: Some(preview.source_hash.clone()),
            ..Default::default()
        };
        let result = engine.apply(&request, &admin()).await.unwrap();
        assert_eq!(result.inserted, 1);

        let runs = db.list_sync_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].user, "admin@example.com");
        assert_eq!(runs[0].source_hash, preview.source_hash);
    }

    #[tokio::test]
    async fn test_empty_selection_records_nothing() {
        let db = Database::in_memory().unwrap();
        let request = ApplyRequest {
            selection: Some(Selection::default()),
            ..Default::default()
        };
        let result = engine(&db, &[("555-0001", "Alice")])
            .apply(&request, &admin())
            .await
            .unwrap();

        assert_eq!(result, ApplyResult::default());
        assert!(db.list_sync_runs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_source_is_transient() {
        struct Down;

        #[async_trait::async_trait]
        impl SheetSource for Down {
            fn describe(&self) -> String {
                "down".into()
            }

            async fn fetch_rows(&self) -> Result<Vec<crate::models::ExternalRow>> {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )))
            }
        }

        let db = Database::in_memory().unwrap();
        let engine = SyncEngine::new(db, Arc::new(Down), LineNumberRules::default());
        let err = engine.preview().await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[tokio::test]
    async fn test_selection_from_preview_applies_only_chosen_rows() {
        let db = Database::in_memory().unwrap();
        let engine = engine(&db, &[("555-0001", "Alice"), ("555-0002", "Bob")]);
        let preview = engine.preview().await.unwrap();
        assert!(preview.diffs.iter().all(|d| d.kind == DiffKind::Create));

        let request = ApplyRequest {
            selection: Some(Selection {
                criar: vec!["555-0002".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = engine.apply(&request, &admin()).await.unwrap();

        assert_eq!(result.inserted, 1);
        assert!(db.get_line_by_number("555-0001").unwrap().is_none());
        assert!(db.get_line_by_number("555-0002").unwrap().is_some());
    }
}
