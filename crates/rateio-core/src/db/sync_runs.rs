//! Sync run history

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{ApplyResult, OnMissingPolicy, SyncRun};

impl Database {
    /// Record an applied sync
    pub fn record_sync_run(
        &self,
        user_email: &str,
        policy: OnMissingPolicy,
        result: &ApplyResult,
        source_hash: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO sync_runs
                (user_email, policy, inserted, updated, inactivated, kept_active, failed, source_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_email,
                policy.as_str(),
                result.inserted as i64,
                result.updated as i64,
                result.inactivated as i64,
                result.kept_active as i64,
                result.failures.len() as i64,
                source_hash,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List recent sync runs, newest first
    pub fn list_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_email, policy, inserted, updated, inactivated, kept_active,
                   failed, source_hash, created_at
            FROM sync_runs
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let runs = stmt
            .query_map(params![limit], |row| {
                let policy_str: String = row.get(2)?;
                let created_at_str: String = row.get(9)?;

                Ok(SyncRun {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    policy: policy_str.parse().unwrap_or_default(),
                    inserted: row.get(3)?,
                    updated: row.get(4)?,
                    inactivated: row.get(5)?,
                    kept_active: row.get(6)?,
                    failed: row.get(7)?,
                    source_hash: row.get(8)?,
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}
