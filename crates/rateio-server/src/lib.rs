//! Rateio Web Server
//!
//! Axum-based REST API for reconciling phone lines against the spreadsheet.
//!
//! Security features:
//! - Bearer API keys mapped to roles (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use rateio_core::db::Database;
use rateio_core::models::{Caller, Role};
use rateio_core::SyncEngine;

mod handlers;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Environment variable holding `key[:role]` entries, comma-separated
pub const API_KEYS_ENV: &str = "RATEIO_API_KEYS";

/// Environment variable holding allowed CORS origins, comma-separated
pub const ALLOWED_ORIGINS_ENV: &str = "RATEIO_ALLOWED_ORIGINS";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Caller identity used when authentication is disabled
const LOCAL_DEV_USER: &str = "local-dev";

/// A configured API key and the role it grants
#[derive(Clone)]
pub struct ApiKey {
    pub key: String,
    pub role: Role,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// Accepted API keys. Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<ApiKey>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub engine: SyncEngine,
    pub config: ServerConfig,
}

/// Who made the request, resolved by `auth_middleware`
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub caller: Caller,
    /// "api_key" or "none"
    pub auth_method: &'static str,
}

/// Authentication middleware - resolves the bearer API key into a caller
///
/// API keys are compared in constant time to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        request.extensions_mut().insert(AuthContext {
            caller: Caller::new(LOCAL_DEV_USER, Role::Admin),
            auth_method: "none",
        });
        return next.run(request).await;
    }

    let role = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|key| validate_api_key(key.trim(), &state.config.api_keys));

    match role {
        Some(role) => {
            debug!(%role, path = %request.uri().path(), "Authenticated via API key");
            request.extensions_mut().insert(AuthContext {
                caller: Caller::new(format!("api-key:{}", role), role),
                auth_method: "api_key",
            });
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Find the role for a provided key
///
/// Every configured key is compared so the time taken does not depend on
/// which key matched.
fn validate_api_key(provided: &str, valid_keys: &[ApiKey]) -> Option<Role> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    let mut found = None;

    for entry in valid_keys {
        let key_bytes = entry.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len()
            && bool::from(provided_bytes.ct_eq(key_bytes))
            && found.is_none()
        {
            found = Some(entry.role);
        }
    }
    found
}

/// Parse a comma-separated list of `key` or `key:role` entries
///
/// A bare key grants `viewer`. Entries with an unknown role are skipped.
///
/// Examples:
/// - "s3cret" - viewer
/// - "s3cret:admin,other:gestor" - an admin key and a manager key
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let (key, role) = match s.rsplit_once(':') {
                Some((key, role)) => match role.parse::<Role>() {
                    Ok(role) => (key.trim(), role),
                    Err(e) => {
                        warn!(error = %e, "Skipping API key with unknown role");
                        return None;
                    }
                },
                None => (s, Role::Viewer),
            };
            if key.is_empty() {
                warn!("Skipping empty API key");
                return None;
            }
            Some(ApiKey {
                key: key.to_string(),
                role,
            })
        })
        .collect()
}

/// Parse a comma-separated list of origins
pub fn parse_origins(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Create the application router
pub fn create_router(
    db: Database,
    engine: SyncEngine,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> Router {
    let state = Arc::new(AppState {
        db,
        engine,
        config: config.clone(),
    });

    let api_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .route("/sync", post(handlers::run_sync))
        .route("/sync/runs", get(handlers::list_sync_runs))
        .route("/lines", get(handlers::list_lines))
        .route("/audit", get(handlers::list_audit_log));

    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self'; frame-ancestors 'none'",
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve the review UI if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve_with_config(
    db: Database,
    engine: SyncEngine,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!(
            "⚠️  No API keys configured ({}); every request will be rejected",
            API_KEYS_ENV
        );
    }

    info!(source = %engine.source().describe(), "Spreadsheet source");

    let app = create_router(db, engine, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    details: Option<serde_json::Value>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn with_details<T: serde::Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Map a core error onto the API's status codes
    pub fn from_core(err: rateio_core::Error) -> Self {
        use rateio_core::Error;

        match err {
            Error::Validation(report) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Spreadsheet has errors: {}", report),
            )
            .with_details(&report),
            Error::Authorization(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            Error::Transient(msg) => Self::new(StatusCode::SERVICE_UNAVAILABLE, msg),
            Error::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            Error::Import(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = match self.details {
            Some(details) => Json(serde_json::json!({
                "error": self.message,
                "details": details,
            })),
            None => Json(serde_json::json!({
                "error": self.message
            })),
        };

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            details: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
