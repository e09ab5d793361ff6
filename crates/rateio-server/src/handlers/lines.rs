//! Stored line handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, AuthContext};
use rateio_core::models::{Line, LineStatus};

/// Query parameters for listing lines
#[derive(Debug, Deserialize)]
pub struct LineQuery {
    /// "active" or "inactive"; all lines when absent
    pub status: Option<String>,
}

/// GET /api/lines - List stored lines
pub async fn list_lines(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<LineQuery>,
) -> Result<Json<Vec<Line>>, AppError> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            s.parse::<LineStatus>()
                .map_err(|e| AppError::bad_request(&e))?,
        ),
    };

    let lines = state.db.list_lines(status).map_err(AppError::from_core)?;

    state.db.log_audit(
        &auth.caller.user,
        "list",
        Some("lines"),
        None,
        status.map(|s| format!("status={}", s)).as_deref(),
    )?;

    Ok(Json(lines))
}
