//! Axum router construction.

use axum::routing::{get, post, put};
use axum::Router;

use crate::web_client::handlers;
use crate::web_client::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Auth API
        .route("/api/auth/register", post(handlers::auth::register_handler))
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .route("/api/auth/me", get(handlers::auth::me_handler))
        // Users API
        .route("/api/users", get(handlers::users::list_users_handler))
        .route("/api/users/:user_id", get(handlers::users::get_user_handler))
        .route(
            "/api/users/:user_id/status",
            get(handlers::connections::connection_status_handler),
        )
        // Profile API
        .route(
            "/api/profile",
            put(handlers::profile::update_profile_handler),
        )
        // Connection Requests API
        .route(
            "/api/requests",
            get(handlers::requests::list_requests_handler)
                .post(handlers::requests::send_request_handler),
        )
        .route(
            "/api/requests/:id/accept",
            post(handlers::requests::accept_request_handler),
        )
        .route(
            "/api/requests/:id/decline",
            post(handlers::requests::decline_request_handler),
        )
        // Connections API
        .route(
            "/api/connections",
            get(handlers::connections::list_connections_handler),
        )
        // Onboarding API
        .route(
            "/api/onboarding",
            get(handlers::onboarding::get_onboarding_handler),
        )
        .route(
            "/api/onboarding/complete",
            post(handlers::onboarding::complete_onboarding_handler),
        )
        .with_state(state)
}
