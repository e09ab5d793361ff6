//! Listing commands (lines, sync runs, audit log)

use anyhow::{anyhow, Result};
use rateio_core::db::Database;
use rateio_core::models::{Caller, LineStatus};

use super::truncate;

pub fn cmd_lines(db: &Database, status: Option<&str>) -> Result<()> {
    let status = status
        .map(|s| s.parse::<LineStatus>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let lines = db.list_lines(status)?;

    if lines.is_empty() {
        println!("No lines stored. Run 'rateio sync preview' to compare with the sheet.");
        return Ok(());
    }

    println!();
    println!("{:<6} {:<20} {:<32} {:<9} Updated", "ID", "Line", "Holder", "Status");
    println!("{}", "-".repeat(88));

    for line in &lines {
        println!(
            "{:<6} {:<20} {:<32} {:<9} {}",
            line.id,
            truncate(&line.line_number, 20),
            truncate(line.full_name.as_deref().unwrap_or("-"), 32),
            line.status,
            line.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("{} line(s)", lines.len());
    Ok(())
}

pub fn cmd_runs(db: &Database, limit: i64) -> Result<()> {
    let runs = db.list_sync_runs(limit.max(1))?;

    if runs.is_empty() {
        println!("No syncs applied yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:<5} {:<17} {:<24} {:<12} {:>4} {:>4} {:>4} {:>4} {:>4}",
        "ID", "When", "User", "Policy", "Ins", "Upd", "Ina", "Kept", "Fail"
    );
    println!("{}", "-".repeat(88));

    for run in &runs {
        println!(
            "{:<5} {:<17} {:<24} {:<12} {:>4} {:>4} {:>4} {:>4} {:>4}",
            run.id,
            run.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&run.user, 24),
            run.policy,
            run.inserted,
            run.updated,
            run.inactivated,
            run.kept_active,
            run.failed
        );
    }

    println!();
    Ok(())
}

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit.max(1))?;

    if entries.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }

    println!();
    for entry in &entries {
        let target = match (&entry.entity_type, entry.entity_id) {
            (Some(kind), Some(id)) => format!("{}#{}", kind, id),
            (Some(kind), None) => kind.clone(),
            _ => String::new(),
        };
        println!(
            "{}  {:<24} {:<18} {:<12} {}",
            entry.timestamp,
            truncate(&entry.user_email, 24),
            entry.action,
            target,
            entry.details.as_deref().unwrap_or("")
        );
    }
    println!();

    // Reading the audit log is itself audited, as on the API
    db.log_audit(
        &Caller::local().user,
        "list",
        Some("audit_log"),
        None,
        Some(&format!("limit={}", limit)),
    )?;
    Ok(())
}
