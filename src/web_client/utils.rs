//! Shared utility functions for the web client.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::accounts;
use crate::storage::{ConnectionRequestRow, UserRow};
use crate::web_client::state::AppState;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Extract the bearer token from the Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

/// Resolve the caller's session token to a user, or produce the error
/// response to return instead.
pub fn require_session(st: &AppState, headers: &HeaderMap) -> Result<UserRow, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(api_error(StatusCode::UNAUTHORIZED, "missing bearer token"));
    };
    match accounts::current_user(&st.storage, &token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "invalid or expired session",
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Build the JSON representation of a user. The password hash never leaves
/// the store layer.
pub fn user_to_json(u: &UserRow) -> serde_json::Value {
    serde_json::json!({
        "id": u.id,
        "email": u.email,
        "username": u.username,
        "name": u.name,
        "bio": u.bio,
        "avatar": u.avatar,
        "join_date": u.join_date,
        "friends_count": u.friends_count,
        "connections_count": u.connections_count,
    })
}

/// Build the JSON representation of a connection request.
pub fn request_to_json(r: &ConnectionRequestRow) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        "from_user_id": r.from_user_id,
        "to_user_id": r.to_user_id,
        "status": r.status,
        "created_at": r.created_at,
        "updated_at": r.updated_at,
    })
}
