//! Integration tests for rateio-core
//!
//! These tests exercise the full sheet → preview → apply workflow against a
//! real database file.

use std::path::Path;
use std::sync::Arc;

use rateio_core::{
    db::Database,
    models::{
        ApplyRequest, Caller, DiffKind, LineStatus, OnMissingPolicy, Role, Selection,
        SelectionAction, SelectionMap,
    },
    sheet::{ColumnNames, CsvFileSource, StaticSource},
    Error, LineNumberRules, SyncEngine,
};

fn admin() -> Caller {
    Caller::new("admin@example.com", Role::Admin)
}

fn engine_for(db: &Database, pairs: &[(&str, &str)]) -> SyncEngine {
    SyncEngine::new(
        db.clone(),
        Arc::new(StaticSource::from_pairs(pairs)),
        LineNumberRules::default(),
    )
}

fn csv_engine(db: &Database, path: &Path) -> SyncEngine {
    SyncEngine::new(
        db.clone(),
        Arc::new(CsvFileSource::new(path, ColumnNames::default())),
        LineNumberRules::default(),
    )
}

/// Alice (555-0001) and Bob (555-0002), both active
fn seeded_db() -> Database {
    let db = Database::in_memory().expect("Failed to create database");
    db.create_line("555-0001", "Alice").unwrap();
    db.create_line("555-0002", "Bob").unwrap();
    db
}

// =============================================================================
// Preview
// =============================================================================

#[tokio::test]
async fn test_rename_and_removal_preview() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0001", "Alice B")]);

    let preview = engine.preview().await.unwrap();

    assert_eq!(preview.summary.create, 0);
    assert_eq!(preview.summary.update, 1);
    assert_eq!(preview.summary.absent, 1);

    let update = &preview.diffs[0];
    assert_eq!(update.kind, DiffKind::Update);
    assert_eq!(update.line_number, "555-0001");
    assert_eq!(update.external_view.as_ref().unwrap().name, "Alice B");
    assert_eq!(
        update.stored_view.as_ref().unwrap().full_name.as_deref(),
        Some("Alice")
    );

    let absent = &preview.diffs[1];
    assert_eq!(absent.kind, DiffKind::AbsentFromSheet);
    assert_eq!(absent.line_number, "555-0002");
    assert_eq!(
        absent.stored_view.as_ref().unwrap().full_name.as_deref(),
        Some("Bob")
    );
}

#[tokio::test]
async fn test_duplicate_keys_block_preview_and_apply() {
    let db = Database::in_memory().unwrap();
    let engine = engine_for(&db, &[("100", "A"), ("100", "B")]);

    match engine.preview().await {
        Err(Error::Validation(report)) => {
            assert_eq!(report.duplicates.len(), 1);
            assert_eq!(report.duplicates[0].numero, "100");
            assert_eq!(report.duplicates[0].lines, vec![1, 2]);
            assert!(report.invalid_rows.is_empty());
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let err = engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(db.count_lines(None).unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_line_numbers_block_sync() {
    let db = Database::in_memory().unwrap();
    let engine = engine_for(&db, &[("555-0001", "Alice"), ("ramal?", "Bob")]);

    match engine.preview().await {
        Err(Error::Validation(report)) => {
            assert_eq!(report.invalid_rows.len(), 1);
            assert_eq!(report.invalid_rows[0].line, 2);
            assert_eq!(report.invalid_rows[0].value, "ramal?");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_preview_writes_nothing() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0003", "Carol")]);

    engine.preview().await.unwrap();

    assert_eq!(db.count_lines(None).unwrap(), 2);
    assert_eq!(db.count_lines(Some(LineStatus::Active)).unwrap(), 2);
    assert!(db.list_sync_runs(10).unwrap().is_empty());
}

// =============================================================================
// Apply
// =============================================================================

#[tokio::test]
async fn test_apply_everything_then_preview_is_empty() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0001", "Alice B"), ("555-0003", "Carol")]);

    let result = engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(result.inactivated, 1);
    assert_eq!(result.kept_active, 0);
    assert_eq!(result.total, 3);
    assert!(result.failures.is_empty());

    let bob = db.get_line_by_number("555-0002").unwrap().unwrap();
    assert_eq!(bob.status, LineStatus::Inactive);

    let preview = engine.preview().await.unwrap();
    assert!(preview.diffs.is_empty());
    assert!(preview.summary.is_empty());
}

#[tokio::test]
async fn test_created_line_renamed_in_sheet_comes_back_as_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linhas.csv");
    std::fs::write(&path, "numero,nome\n555-0003,Carol\n").unwrap();

    let db = Database::in_memory().unwrap();
    let engine = csv_engine(&db, &path);

    let result = engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();
    assert_eq!(result.inserted, 1);

    std::fs::write(&path, "numero,nome\n555-0003,Carol Souza\n").unwrap();

    let preview = engine.preview().await.unwrap();
    assert_eq!(preview.diffs.len(), 1);
    let diff = &preview.diffs[0];
    assert_eq!(diff.kind, DiffKind::Update);
    assert_eq!(diff.line_number, "555-0003");
    assert_eq!(
        diff.stored_view.as_ref().and_then(|v| v.full_name.as_deref()),
        Some("Carol")
    );
    assert_eq!(
        diff.external_view.as_ref().map(|v| v.name.as_str()),
        Some("Carol Souza")
    );
    assert_eq!(preview.summary.create, 0);
    assert_eq!(preview.summary.update, 1);
}

#[tokio::test]
async fn test_empty_selection_is_idempotent() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0001", "Alice B"), ("555-0003", "Carol")]);
    let before = db.list_lines(None).unwrap();

    let request = ApplyRequest {
        selection: Some(Selection::default()),
        ..Default::default()
    };
    let result = engine.apply(&request, &admin()).await.unwrap();

    assert_eq!(result.total, 0);
    let after = db.list_lines(None).unwrap();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.line_number, b.line_number);
        assert_eq!(a.full_name, b.full_name);
        assert_eq!(a.status, b.status);
    }
}

#[tokio::test]
async fn test_keep_active_counts_without_writing() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0001", "Alice")]);

    let request = ApplyRequest {
        on_missing: OnMissingPolicy::KeepActive,
        ..Default::default()
    };
    let result = engine.apply(&request, &admin()).await.unwrap();

    assert_eq!(result.kept_active, 1);
    assert_eq!(result.inactivated, 0);
    assert_eq!(result.total, 1);

    let bob = db.get_line_by_number("555-0002").unwrap().unwrap();
    assert_eq!(bob.status, LineStatus::Active);

    // Bob is still absent from the sheet, so he shows up again
    let preview = engine.preview().await.unwrap();
    assert_eq!(preview.summary.absent, 1);
}

#[tokio::test]
async fn test_manter_overrides_other_lists() {
    let db = seeded_db();
    let engine = engine_for(&db, &[("555-0001", "Alice B")]);
    let preview = engine.preview().await.unwrap();

    let mut choices = SelectionMap::new();
    choices.insert("555-0001".into(), SelectionAction::ApplyExternal);
    choices.insert("555-0002".into(), SelectionAction::KeepStored);
    let mut selection = Selection::from_choices(&preview.diffs, &choices);
    // Listed in both: keeping wins
    selection.ausentes.push("555-0002".into());

    let request = ApplyRequest {
        selection: Some(selection),
        ..Default::default()
    };
    let result = engine.apply(&request, &admin()).await.unwrap();

    assert_eq!(result.updated, 1);
    assert_eq!(result.inactivated, 0);
    let bob = db.get_line_by_number("555-0002").unwrap().unwrap();
    assert_eq!(bob.status, LineStatus::Active);
}

#[tokio::test]
async fn test_returning_line_is_reactivated() {
    let db = seeded_db();

    // Bob leaves the sheet
    engine_for(&db, &[("555-0001", "Alice")])
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();
    let bob_id = db.get_line_by_number("555-0002").unwrap().unwrap().id;

    // ...and comes back under a new holder
    let engine = engine_for(&db, &[("555-0001", "Alice"), ("555-0002", "Dave")]);
    let preview = engine.preview().await.unwrap();
    assert_eq!(preview.diffs.len(), 1);
    assert_eq!(preview.diffs[0].kind, DiffKind::Create);

    let result = engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();
    assert_eq!(result.inserted, 1);

    let line = db.get_line_by_number("555-0002").unwrap().unwrap();
    assert_eq!(line.id, bob_id);
    assert_eq!(line.status, LineStatus::Active);
    assert_eq!(line.full_name.as_deref(), Some("Dave"));
    assert_eq!(db.count_lines(None).unwrap(), 2);
}

#[tokio::test]
async fn test_row_failure_does_not_block_the_batch() {
    let db = seeded_db();
    db.conn()
        .unwrap()
        .execute_batch(
            r#"
            CREATE TRIGGER lock_bob BEFORE UPDATE ON lines
            WHEN NEW.line_number = '555-0002'
            BEGIN
                SELECT RAISE(ABORT, 'line is locked');
            END;
            "#,
        )
        .unwrap();

    let engine = engine_for(&db, &[("555-0001", "Alice B"), ("555-0002", "Bob B")]);
    let result = engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();

    assert_eq!(result.updated, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].line_number, "555-0002");
    assert_eq!(result.failures[0].kind, DiffKind::Update);
    assert!(result.failures[0].error.contains("line is locked"));
    assert!(result.is_partial());

    let alice = db.get_line_by_number("555-0001").unwrap().unwrap();
    assert_eq!(alice.full_name.as_deref(), Some("Alice B"));
    let bob = db.get_line_by_number("555-0002").unwrap().unwrap();
    assert_eq!(bob.full_name.as_deref(), Some("Bob"));

    let runs = db.list_sync_runs(1).unwrap();
    assert_eq!(runs[0].failed, 1);
}

// =============================================================================
// CSV file source
// =============================================================================

#[tokio::test]
async fn test_sheet_edit_between_preview_and_apply_is_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linhas.csv");
    std::fs::write(&path, "Número,Nome\n555-0001,Alice\n").unwrap();

    let db = Database::in_memory().unwrap();
    let engine = csv_engine(&db, &path);
    let preview = engine.preview().await.unwrap();
    assert_eq!(preview.summary.create, 1);

    std::fs::write(&path, "Número,Nome\n555-0001,Alice\n555-0002,Bob\n").unwrap();

    let request = ApplyRequest {
        expected_hash: Some(preview.source_hash),
        ..Default::default()
    };
    let err = engine.apply(&request, &admin()).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(db.count_lines(None).unwrap(), 0);
}

#[tokio::test]
async fn test_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linhas.csv");
    std::fs::write(
        &path,
        "Linha,Colaborador\n 555-0001 ,Alice\n555-0002,Bob\n,\n555-0003,\n",
    )
    .unwrap();

    let db = Database::in_memory().unwrap();
    let engine = csv_engine(&db, &path);

    let preview = engine.preview().await.unwrap();
    assert_eq!(preview.summary.create, 3);
    let warnings = preview.warnings.unwrap();
    assert_eq!(warnings.empty_names.len(), 1);
    assert_eq!(warnings.empty_names[0].line_number, "555-0003");

    engine
        .apply(&ApplyRequest::default(), &admin())
        .await
        .unwrap();
    assert!(engine.preview().await.unwrap().diffs.is_empty());

    let alice = db.get_line_by_number("555-0001").unwrap().unwrap();
    assert_eq!(alice.full_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn test_missing_sheet_file_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().unwrap();
    let engine = csv_engine(&db, &dir.path().join("nope.csv"));

    let err = engine.preview().await.unwrap_err();
    assert!(matches!(err, Error::Transient(_)));
}
