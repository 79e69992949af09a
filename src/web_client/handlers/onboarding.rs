//! Onboarding flag handlers.
//!
//! The flag is device-local, not per-account, so these endpoints take no
//! session token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::accounts;
use crate::web_client::state::SharedState;
use crate::web_client::utils::api_error;

pub async fn get_onboarding_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match accounts::is_onboarding_complete(&st.storage) {
        Ok(complete) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "complete": complete })),
        )
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn complete_onboarding_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match accounts::complete_onboarding(&st.storage) {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "complete": true })),
        )
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
