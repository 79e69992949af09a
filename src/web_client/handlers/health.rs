//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web_client::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let user_count = state.storage.count_users().unwrap_or(0);
    let connection_count = state.storage.count_connections().unwrap_or(0);

    let body = serde_json::json!({
        "status": "ok",
        "users": user_count,
        "connections": connection_count,
    });
    (StatusCode::OK, axum::Json(body))
}
