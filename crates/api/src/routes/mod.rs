//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Service banner
//! GET  /health                    - Liveness
//! GET  /health/db                 - Database readiness
//! GET  /health/provider           - Identity provider probe (delegated mode)
//!
//! # Auth (under the API prefix, default /api)
//! POST {prefix}/auth/register     - Register
//! POST {prefix}/auth/login        - Exchange credentials for a bearer token
//!
//! # Users (requires bearer token)
//! GET  {prefix}/users/me          - Resolved principal
//! ```

pub mod auth;
pub mod health;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(users::me))
}

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/health/db", get(health::database))
        .route("/health/provider", get(health::provider))
}

/// Build the complete application router with state and request tracing.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes());

    let prefix = state.config().api_prefix.clone();
    let app = if prefix.is_empty() {
        health_routes().merge(api)
    } else {
        health_routes().nest(&prefix, api)
    };

    app.with_state(state).layer(TraceLayer::new_for_http())
}
