//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use lektor_core::domain::NavIntent;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::web::protocol::nav_path;
use crate::web::state::AppState;

/// Middleware that validates the session cookie and extracts the caller's identity.
///
/// If valid, inserts the `Identity` into request extensions for handlers to use.
/// If invalid or missing, returns 401 with a login navigation intent: a
/// missing identity is a redirect-to-login, never an in-page error.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let cookie_name = state.config.session_cookie.as_str();

    let token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                c.trim()
                    .strip_prefix(cookie_name)
                    .and_then(|rest| rest.strip_prefix('='))
            })
        })
        .ok_or_else(login_redirect)?;

    let identity = state.identity.validate_session(token).await.map_err(|e| {
        debug!("session validation failed: {:?}", e);
        login_redirect()
    })?;

    // Sliding expiry: any authenticated request keeps the session fresh.
    // A failed refresh is not fatal while the session itself is valid.
    if let Err(e) = state.identity.refresh_session(token).await {
        debug!("session refresh failed: {:?}", e);
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn login_redirect() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "kind": "unauthenticated",
            "navigate": nav_path(NavIntent::Login),
        })),
    )
        .into_response()
}
