//! Authorization decision endpoint.
//!
//! Lets a reverse proxy or another service ask whether the bearer token on
//! a request grants one permission.

use crate::errors::AuthError;
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for a granted permission.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    pub success: bool,

    /// Subject, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Every permission the token grants.
    pub permissions: Vec<String>,

    /// Token expiration timestamp.
    pub exp: i64,
}

/// Handler for GET /api/v1/authorize/:permission
///
/// ## Response
///
/// Returns 200 OK when the permission is granted:
///
/// ```json
/// {
///   "success": true,
///   "sub": "auth0|barista",
///   "permissions": ["get:drinks-detail", "post:drinks"],
///   "exp": 1700000600
/// }
/// ```
///
/// Otherwise the [`AuthError`] response (401 or 403).
#[instrument(skip_all, name = "gate.handlers.authorize", fields(permission = %permission))]
pub async fn authorize_permission(
    State(state): State<Arc<AppState>>,
    Path(permission): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AuthorizeResponse>, AuthError> {
    let auth_header = match headers.get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "gate.handlers.authorize", "Authorization header is not visible ASCII");
            AuthError::AuthHeaderMalformed("Authorization header is not valid text")
        })?),
        None => None,
    };

    let claims = state.gate.authorize(auth_header, &permission).await?;

    Ok(Json(AuthorizeResponse {
        success: true,
        sub: claims.sub,
        permissions: claims.permissions.unwrap_or_default(),
        exp: claims.exp,
    }))
}
