//! Current-user route.

use axum::{Json, extract::State};
use serde::Serialize;

use driphub_core::{AuthMethod, Email, UserId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::auth::AuthError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Option<UserId>,
    pub email: Email,
    pub is_active: bool,
    pub auth_method: AuthMethod,
}

/// `GET /users/me`
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<MeResponse>> {
    let is_active = match principal.local_user_id {
        Some(id) => {
            state
                .users()
                .find_by_id(id)
                .await?
                .ok_or(AuthError::UserNotFound)?
                .is_active
        }
        None => true,
    };

    Ok(Json(MeResponse {
        id: principal.local_user_id,
        email: principal.email,
        is_active,
        auth_method: principal.method,
    }))
}
