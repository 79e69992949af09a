//! Registration, login, and session handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::accounts::{self, AccountError, NewAccount};
use crate::web_client::state::SharedState;
use crate::web_client::utils::{api_error, bearer_token, require_session, user_to_json};

#[derive(Deserialize)]
pub struct RegisterPayload {
    email: String,
    password: String,
    name: String,
    username: String,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    email: String,
    password: String,
}

fn account_error_response(e: AccountError) -> Response {
    match e {
        AccountError::DuplicateEmail(_) | AccountError::DuplicateUsername(_) => {
            api_error(StatusCode::CONFLICT, e.to_string())
        }
        AccountError::InvalidCredentials => api_error(StatusCode::UNAUTHORIZED, e.to_string()),
        AccountError::UserNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        AccountError::Hash(_) | AccountError::Storage(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn register_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RegisterPayload>,
) -> Response {
    let email = req.email.trim().to_lowercase();
    let username = req.username.trim().to_lowercase();
    let name = req.name.trim().to_string();

    if email.is_empty() || username.is_empty() || name.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "email, username, and name cannot be empty",
        );
    }
    if req.password.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "password cannot be empty");
    }

    let st = state.lock().await;
    match accounts::register(
        &st.storage,
        NewAccount {
            email,
            password: req.password,
            name,
            username,
        },
    ) {
        Ok((user, session)) => {
            crate::klog!(
                "auth: registered {} ({})",
                crate::logging::user_id(&user.id),
                user.username
            );
            let json = serde_json::json!({
                "token": session.token,
                "user": user_to_json(&user),
            });
            (StatusCode::CREATED, axum::Json(json)).into_response()
        }
        Err(e) => account_error_response(e),
    }
}

pub async fn login_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<LoginPayload>,
) -> Response {
    let email = req.email.trim().to_lowercase();

    let st = state.lock().await;
    match accounts::login(&st.storage, &email, &req.password) {
        Ok((user, session)) => {
            crate::klog!("auth: login for {}", crate::logging::user_id(&user.id));
            let json = serde_json::json!({
                "token": session.token,
                "user": user_to_json(&user),
            });
            (StatusCode::OK, axum::Json(json)).into_response()
        }
        Err(e) => account_error_response(e),
    }
}

pub async fn logout_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return api_error(StatusCode::UNAUTHORIZED, "missing bearer token");
    };
    let st = state.lock().await;
    match accounts::logout(&st.storage, &token) {
        Ok(existed) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "logged_out": existed })),
        )
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn me_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_session(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    (StatusCode::OK, axum::Json(user_to_json(&user))).into_response()
}
