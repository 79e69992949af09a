//! User discovery handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::accounts;
use crate::connections;
use crate::web_client::state::SharedState;
use crate::web_client::utils::{api_error, require_session, user_to_json};

/// List every other user, annotated with the caller's relationship to them.
pub async fn list_users_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let users = match accounts::list_users(&st.storage) {
        Ok(users) => users,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut json = Vec::new();
    for user in users.iter().filter(|u| u.id != caller.id) {
        let status = match connections::status_between(&st.storage, &caller.id, &user.id) {
            Ok(status) => status,
            Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        let mut j = user_to_json(user);
        j["connection_status"] = serde_json::json!(status.as_str());
        json.push(j);
    }
    (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
}

pub async fn get_user_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let user = match st.storage.get_user(&user_id) {
        Ok(Some(user)) => user,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut j = user_to_json(&user);
    if user.id != caller.id {
        match connections::status_between(&st.storage, &caller.id, &user.id) {
            Ok(status) => j["connection_status"] = serde_json::json!(status.as_str()),
            Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
    (StatusCode::OK, axum::Json(j)).into_response()
}
