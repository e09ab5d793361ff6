//! Spreadsheet sync handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppError, AppState, AuthContext, MAX_PAGE_LIMIT};
use rateio_core::models::{ApplyRequest, OnMissingPolicy, Selection, SyncRun};

/// Options accepted with `"action": "apply"`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptions {
    #[serde(default)]
    pub on_missing_in_sheet: OnMissingPolicy,
    /// `sourceHash` from the preview the operator reviewed
    pub expected_hash: Option<String>,
}

/// Body of POST /api/sync
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SyncRequest {
    Preview,
    Apply {
        #[serde(default)]
        options: ApplyOptions,
        /// Absent applies every diff
        #[serde(default)]
        selection: Option<Selection>,
    },
}

/// POST /api/sync - Preview or apply a sync
pub async fn run_sync(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SyncRequest>,
) -> Result<Response, AppError> {
    let user = auth.caller.user.as_str();

    match body {
        SyncRequest::Preview => {
            let preview = state.engine.preview().await.map_err(AppError::from_core)?;

            state.db.log_audit(
                user,
                "sync_preview",
                Some("lines"),
                None,
                Some(&format!(
                    "criar={} atualizar={} ausentes={}",
                    preview.summary.create, preview.summary.update, preview.summary.absent
                )),
            )?;

            Ok(Json(preview).into_response())
        }
        SyncRequest::Apply { options, selection } => {
            let request = ApplyRequest {
                selection,
                on_missing: options.on_missing_in_sheet,
                expected_hash: options.expected_hash,
            };

            let result = match state.engine.apply(&request, &auth.caller).await {
                Ok(result) => result,
                Err(e) => {
                    if matches!(e, rateio_core::Error::Authorization(_)) {
                        state.db.log_audit(
                            user,
                            "sync_apply_denied",
                            Some("lines"),
                            None,
                            Some(&format!("role={}", auth.caller.role)),
                        )?;
                    }
                    return Err(AppError::from_core(e));
                }
            };

            // The batches are committed: report the counts even if the audit write fails
            if let Err(e) = state.db.log_audit(
                user,
                "sync_apply",
                Some("lines"),
                None,
                Some(&format!(
                    "policy={} inserted={} updated={} inactivated={} kept_active={} failed={}",
                    request.on_missing,
                    result.inserted,
                    result.updated,
                    result.inactivated,
                    result.kept_active,
                    result.failures.len()
                )),
            ) {
                warn!(user, error = %e, "Failed to audit sync apply");
            }

            if result.is_partial() {
                warn!(user, failed = result.failures.len(), "Sync applied partially");
                return Ok((StatusCode::MULTI_STATUS, Json(result)).into_response());
            }

            info!(user, total = result.total, "Sync applied");
            Ok(Json(result).into_response())
        }
    }
}

/// Query parameters for sync history
#[derive(Debug, Deserialize)]
pub struct SyncRunQuery {
    #[serde(default = "default_runs_limit")]
    pub limit: i64,
}

fn default_runs_limit() -> i64 {
    20
}

/// GET /api/sync/runs - List applied syncs, newest first
pub async fn list_sync_runs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<SyncRunQuery>,
) -> Result<Json<Vec<SyncRun>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let runs = state.db.list_sync_runs(limit)?;

    state.db.log_audit(
        &auth.caller.user,
        "list",
        Some("sync_runs"),
        None,
        Some(&format!("limit={}", limit)),
    )?;

    Ok(Json(runs))
}
