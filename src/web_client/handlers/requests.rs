//! Connection request handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::connections::{self, ConnectionError};
use crate::storage::ConnectionRequestRow;
use crate::web_client::state::{AppState, SharedState};
use crate::web_client::utils::{api_error, request_to_json, require_session, user_to_json};

#[derive(Deserialize)]
pub struct SendRequestPayload {
    to_user_id: String,
}

#[derive(Deserialize)]
pub struct ListRequestsQuery {
    direction: Option<String>,
}

fn connection_error_response(e: ConnectionError) -> Response {
    match e {
        ConnectionError::SelfRequest => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        ConnectionError::AlreadyConnected | ConnectionError::RequestPending => {
            api_error(StatusCode::CONFLICT, e.to_string())
        }
        ConnectionError::AlreadyResolved(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        ConnectionError::RequestNotFound(_) | ConnectionError::UserNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, e.to_string())
        }
        ConnectionError::Storage(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Attach the counterpart user snapshot to a request row for display.
fn request_with_user(st: &AppState, r: &ConnectionRequestRow, incoming: bool) -> serde_json::Value {
    let counterpart_id = if incoming {
        &r.from_user_id
    } else {
        &r.to_user_id
    };
    let counterpart = st
        .storage
        .get_user(counterpart_id)
        .ok()
        .flatten()
        .map(|u| user_to_json(&u));
    let mut j = request_to_json(r);
    let key = if incoming { "from_user" } else { "to_user" };
    j[key] = counterpart.unwrap_or(serde_json::Value::Null);
    j
}

pub async fn list_requests_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListRequestsQuery>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let direction = query.direction.as_deref().unwrap_or("incoming");
    let (rows, incoming) = match direction {
        "incoming" => (connections::pending_requests(&st.storage, &caller.id), true),
        "outgoing" => (connections::sent_requests(&st.storage, &caller.id), false),
        other => {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("unknown direction {other:?}; expected incoming or outgoing"),
            )
        }
    };

    match rows {
        Ok(rows) => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| request_with_user(&st, r, incoming))
                .collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn send_request_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<SendRequestPayload>,
) -> Response {
    let to_user_id = req.to_user_id.trim().to_string();
    if to_user_id.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "to_user_id cannot be empty");
    }

    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match connections::send_request(&st.storage, &caller.id, &to_user_id) {
        Ok(request) => {
            crate::klog!(
                "connection-request: {} -> {} (id={})",
                crate::logging::user_id(&caller.id),
                crate::logging::user_id(&to_user_id),
                request.id
            );
            (StatusCode::CREATED, axum::Json(request_to_json(&request))).into_response()
        }
        Err(e) => connection_error_response(e),
    }
}

pub async fn accept_request_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    // Only the recipient may accept.
    match st.storage.get_connection_request(id) {
        Ok(Some(request)) if request.to_user_id != caller.id => {
            return api_error(
                StatusCode::FORBIDDEN,
                "only the recipient can accept a connection request",
            );
        }
        Ok(Some(_)) => {}
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "connection request not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    match connections::accept_request(&st.storage, id) {
        Ok(connection) => {
            crate::klog!(
                "connection-request: accepted id={} ({} <-> {})",
                id,
                crate::logging::user_id(&connection.user_id),
                crate::logging::user_id(&connection.connected_user_id)
            );
            let json = serde_json::json!({
                "id": connection.id,
                "user_id": connection.user_id,
                "connected_user_id": connection.connected_user_id,
                "status": connection.status,
                "created_at": connection.created_at,
                "updated_at": connection.updated_at,
            });
            (StatusCode::OK, axum::Json(json)).into_response()
        }
        Err(e) => connection_error_response(e),
    }
}

pub async fn decline_request_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match st.storage.get_connection_request(id) {
        Ok(Some(request)) if request.to_user_id != caller.id => {
            return api_error(
                StatusCode::FORBIDDEN,
                "only the recipient can decline a connection request",
            );
        }
        Ok(Some(_)) => {}
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "connection request not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    match connections::decline_request(&st.storage, id) {
        Ok(()) => {
            crate::klog!("connection-request: declined id={}", id);
            (
                StatusCode::OK,
                axum::Json(serde_json::json!({ "status": "declined", "id": id })),
            )
                .into_response()
        }
        Err(e) => connection_error_response(e),
    }
}
