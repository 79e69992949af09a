//! Accepted-connection handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::connections;
use crate::web_client::state::SharedState;
use crate::web_client::utils::{api_error, require_session, user_to_json};

/// The caller's connections, resolved to full user records.
pub async fn list_connections_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match connections::connected_users(&st.storage, &caller.id) {
        Ok(users) => {
            let json: Vec<serde_json::Value> = users.iter().map(user_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// The caller's relationship to one other user.
pub async fn connection_status_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match connections::status_between(&st.storage, &caller.id, &user_id) {
        Ok(status) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "status": status.as_str() })),
        )
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
