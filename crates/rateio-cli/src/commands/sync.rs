//! Sync command implementations (preview, apply)

use anyhow::{bail, Context, Result};
use rateio_core::db::Database;
use rateio_core::models::{
    ApplyRequest, ApplyResult, Caller, DiffKind, OnMissingPolicy, Selection, SyncPreview,
    ValidationReport,
};
use rateio_core::{Error, SyncEngine};
use tracing::warn;

use super::truncate;

/// Options for `rateio sync apply`
#[derive(Debug, Default)]
pub struct ApplyArgs {
    pub policy: OnMissingPolicy,
    pub all: bool,
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub absent: Vec<String>,
    pub keep: Vec<String>,
    pub expected_hash: Option<String>,
    pub json: bool,
}

impl ApplyArgs {
    fn has_picks(&self) -> bool {
        !(self.create.is_empty() && self.update.is_empty() && self.absent.is_empty())
    }
}

pub async fn cmd_sync_preview(engine: &SyncEngine, json: bool) -> Result<()> {
    let preview = match engine.preview().await {
        Ok(preview) => preview,
        Err(Error::Validation(report)) => {
            print_validation_report(&report);
            bail!("Spreadsheet has errors: {}", report);
        }
        Err(e) => return Err(e).context("Preview failed"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        print_preview(&preview, &engine.source().describe());
    }

    Ok(())
}

pub async fn cmd_sync_apply(db: &Database, engine: &SyncEngine, args: ApplyArgs) -> Result<()> {
    if args.all && args.has_picks() {
        bail!("--all cannot be combined with --create/--update/--absent");
    }
    if !args.all && !args.has_picks() {
        bail!("Nothing selected. Pass --all, or pick lines with --create/--update/--absent");
    }

    let caller = Caller::local();

    let (selection, expected_hash) = if args.all {
        // Pin the apply to what was just previewed
        let preview = engine.preview().await.map_err(explain)?;
        let mut selection = Selection::all(&preview.diffs);
        selection.manter = args.keep.clone();
        let hash = args.expected_hash.clone().unwrap_or(preview.source_hash);
        (selection, Some(hash))
    } else {
        let selection = Selection {
            criar: args.create.clone(),
            atualizar: args.update.clone(),
            ausentes: args.absent.clone(),
            manter: args.keep.clone(),
        };
        (selection, args.expected_hash.clone())
    };

    let request = ApplyRequest {
        selection: Some(selection),
        on_missing: args.policy,
        expected_hash,
    };

    let result = engine.apply(&request, &caller).await.map_err(explain)?;

    // The batches are committed: still print the counts if the audit write fails
    if let Err(e) = db.log_audit(
        &caller.user,
        "sync_apply",
        Some("lines"),
        None,
        Some(&format!(
            "policy={} inserted={} updated={} inactivated={} kept_active={} failed={}",
            args.policy,
            result.inserted,
            result.updated,
            result.inactivated,
            result.kept_active,
            result.failures.len()
        )),
    ) {
        warn!(user = %caller.user, error = %e, "Failed to audit sync apply");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_apply_result(&result, args.policy);
    }

    if result.is_partial() {
        eprintln!("The other rows were applied. Run 'rateio sync preview' to see what is left.");
        return Err(Error::PartialApply(Box::new(result)).into());
    }

    Ok(())
}

/// Turn a core error into a CLI error, printing validation detail first
fn explain(err: Error) -> anyhow::Error {
    match err {
        Error::Validation(report) => {
            print_validation_report(&report);
            anyhow::anyhow!("Spreadsheet has errors: {}", report)
        }
        Error::Conflict(msg) => anyhow::anyhow!("{}", msg),
        other => anyhow::Error::new(other).context("Apply failed"),
    }
}

fn kind_label(kind: DiffKind) -> &'static str {
    match kind {
        DiffKind::Create => "➕ create",
        DiffKind::Update => "✏️  update",
        DiffKind::AbsentFromSheet => "➖ absent",
    }
}

fn print_preview(preview: &SyncPreview, source: &str) {
    println!();
    println!("📋 Sync Preview ({})", source);
    println!("   ─────────────────────────────────────────────────────────────");

    if preview.diffs.is_empty() {
        println!("   ✅ Stored lines match the spreadsheet");
    } else {
        println!(
            "   {:<12} {:<20} {:<28} {}",
            "Kind", "Line", "Stored", "Sheet"
        );
        for diff in &preview.diffs {
            let stored = diff
                .stored_view
                .as_ref()
                .and_then(|v| v.full_name.as_deref())
                .unwrap_or("-");
            let sheet = diff
                .external_view
                .as_ref()
                .map(|v| v.name.as_str())
                .unwrap_or("-");
            println!(
                "   {:<12} {:<20} {:<28} {}",
                kind_label(diff.kind),
                truncate(&diff.line_number, 20),
                truncate(stored, 28),
                truncate(sheet, 28)
            );
        }
    }

    println!();
    println!(
        "   Create: {}   Update: {}   Absent: {}",
        preview.summary.create, preview.summary.update, preview.summary.absent
    );

    if let Some(warnings) = &preview.warnings {
        println!();
        println!(
            "   ⚠️  {} row(s) without a holder name:",
            warnings.empty_names.len()
        );
        for empty in &warnings.empty_names {
            println!("      row {}: {}", empty.line, empty.line_number);
        }
    }

    println!();
    println!("   Hash: {}", preview.source_hash);
    println!();
}

fn print_validation_report(report: &ValidationReport) {
    eprintln!();
    eprintln!("❌ The spreadsheet must be fixed before syncing");
    for dup in &report.duplicates {
        let lines: Vec<String> = dup.lines.iter().map(|l| l.to_string()).collect();
        eprintln!(
            "   Duplicate line number {} on rows {}",
            dup.numero,
            lines.join(", ")
        );
    }
    for invalid in &report.invalid_rows {
        eprintln!(
            "   Row {}: invalid line number '{}'",
            invalid.line, invalid.value
        );
    }
    eprintln!();
}

fn print_apply_result(result: &ApplyResult, policy: OnMissingPolicy) {
    println!();
    println!("📥 Sync Applied (policy: {})", policy);
    println!("   ─────────────────────────────");
    println!("   Inserted:    {}", result.inserted);
    println!("   Updated:     {}", result.updated);
    println!("   Inactivated: {}", result.inactivated);
    println!("   Kept active: {}", result.kept_active);
    println!("   Total:       {}", result.total);

    if !result.failures.is_empty() {
        println!();
        println!("   ❌ Failed rows:");
        for failure in &result.failures {
            println!(
                "      {} {}: {}",
                failure.kind, failure.line_number, failure.error
            );
        }
    }
    println!();
}
