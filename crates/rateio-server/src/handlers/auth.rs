//! Authentication-related handlers

use axum::{Extension, Json};
use serde::Serialize;

use crate::AuthContext;
use rateio_core::models::Role;

/// Response for the /api/me endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// The authenticated user's identifier
    pub user: String,
    pub role: Role,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(Extension(auth): Extension<AuthContext>) -> Json<MeResponse> {
    Json(MeResponse {
        user: auth.caller.user,
        role: auth.caller.role,
        auth_method: auth.auth_method.to_string(),
    })
}
