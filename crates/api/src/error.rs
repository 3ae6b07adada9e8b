//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON envelope: `{"message": "..."}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body could not be parsed.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// A dependency is down.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl AppError {
    const fn is_server_fault(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Auth(err) => err.is_server_fault(),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Auth(err) => match err {
                AuthError::NotAuthenticated
                | AuthError::InvalidCredential
                | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UpstreamError(_) | AuthError::MalformedUpstreamResponse => {
                    StatusCode::BAD_GATEWAY
                }
                AuthError::ConflictOnCreate => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_) | AuthError::EmptyPassword => StatusCode::BAD_REQUEST,
                AuthError::ProviderRejected { status, .. } => StatusCode::from_u16(*status)
                    .ok()
                    .filter(StatusCode::is_client_error)
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                AuthError::ConfigurationError(_)
                | AuthError::PasswordHash
                | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    // Don't expose internal error details to clients
    fn client_message(&self) -> String {
        match self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::NotFound(msg) | Self::Unprocessable(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
            Self::Auth(err) => match err {
                AuthError::NotAuthenticated => "Not authenticated".to_string(),
                AuthError::InvalidCredential => "Invalid credentials".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UpstreamError(_) => "Identity provider unavailable".to_string(),
                AuthError::MalformedUpstreamResponse => {
                    "Identity provider returned an incomplete user".to_string()
                }
                AuthError::ConflictOnCreate => "Email already registered".to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::EmptyPassword => "Password must not be empty".to_string(),
                AuthError::ProviderRejected { message, .. } => {
                    if message.is_empty() {
                        "Identity provider rejected the request".to_string()
                    } else {
                        message.clone()
                    }
                }
                AuthError::ConfigurationError(_)
                | AuthError::PasswordHash
                | AuthError::Repository(_) => "Internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let mut response = (status, Json(json!({ "message": self.client_message() }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated request.
pub fn set_sentry_user(user_id: Option<&impl ToString>, email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: user_id.map(ToString::to_string),
            email: Some(email.to_owned()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_message(err: AppError) -> String {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["message"].as_str().unwrap().to_owned()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("provider".to_string());
        assert_eq!(err.to_string(), "Not found: provider");

        let err = AppError::Unprocessable("missing field `password`".to_string());
        assert_eq!(err.to_string(), "Unprocessable: missing field `password`");
    }

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(
            get_status(AuthError::NotAuthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::InvalidCredential.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserNotFound.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UpstreamError("down".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AuthError::MalformedUpstreamResponse.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AuthError::ConflictOnCreate.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::EmptyPassword.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::ConfigurationError("no key".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_rejection_status_passthrough() {
        let client = AuthError::ProviderRejected {
            status: 422,
            message: "taken".into(),
        };
        let server = AuthError::ProviderRejected {
            status: 503,
            message: String::new(),
        };
        assert_eq!(get_status(client.into()), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(get_status(server.into()), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = AppError::from(AuthError::NotAuthenticated).into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let msg = body_message(AuthError::ConfigurationError("secret path".into()).into()).await;
        assert_eq!(msg, "Internal server error");

        let msg = body_message(AuthError::ConflictOnCreate.into()).await;
        assert_eq!(msg, "Email already registered");
    }
}
