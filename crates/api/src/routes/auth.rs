//! Authentication route handlers.
//!
//! JSON registration and login under the configured strategy.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::UserView;
use crate::state::AppState;

const TOKEN_TYPE: &str = "bearer";

// =============================================================================
// Request Types
// =============================================================================

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login body. `username` is accepted as an alias for `email`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserView,
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let Json(req) = payload?;
    let registration = state.auth().register(&req.email, &req.password).await?;

    let response = match registration.access_token {
        Some(token) => RegisterResponse {
            user: UserView::from(&registration.user),
            access_token: Some(token),
            token_type: Some(TOKEN_TYPE),
            message: None,
        },
        None => RegisterResponse {
            user: UserView::from(&registration.user),
            access_token: None,
            token_type: None,
            message: Some("account created; sign in to continue"),
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(req) = payload?;
    let access_token = state.auth().login(&req.email, &req.password).await?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE,
    }))
}
