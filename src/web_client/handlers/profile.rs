//! Profile edit handler.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::accounts::{self, AccountError, ProfileUpdate};
use crate::web_client::state::SharedState;
use crate::web_client::utils::{api_error, require_session, user_to_json};

#[derive(Deserialize)]
pub struct UpdateProfilePayload {
    name: Option<String>,
    username: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<UpdateProfilePayload>,
) -> Response {
    let st = state.lock().await;
    let caller = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let update = ProfileUpdate {
        name: req.name.map(|n| n.trim().to_string()),
        username: req.username.map(|u| u.trim().to_lowercase()),
        bio: req.bio,
        avatar: req.avatar,
    };

    match accounts::update_profile(&st.storage, &caller.id, update) {
        Ok(user) => {
            crate::klog!("profile: updated {}", crate::logging::user_id(&user.id));
            (StatusCode::OK, axum::Json(user_to_json(&user))).into_response()
        }
        Err(e @ AccountError::DuplicateUsername(_)) => {
            api_error(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ AccountError::UserNotFound(_)) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
