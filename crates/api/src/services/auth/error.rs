//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Reasons a request or credential exchange is rejected.
///
/// Every variant is terminal for the current request; nothing here is
/// retried internally.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer credential was presented.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Token or password verification failed.
    #[error("invalid credentials")]
    InvalidCredential,

    /// The identity provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    UpstreamError(String),

    /// The provider accepted the token but returned no email.
    #[error("identity provider response missing email")]
    MalformedUpstreamResponse,

    /// A valid local token names an account that does not exist.
    #[error("user not found")]
    UserNotFound,

    /// A required secret or URL is absent.
    #[error("authentication misconfigured: {0}")]
    ConfigurationError(String),

    /// Registration email already exists.
    #[error("email already registered")]
    ConflictOnCreate,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] driphub_core::EmailError),

    /// Password missing from the request.
    #[error("password must not be empty")]
    EmptyPassword,

    /// The provider refused a sign-up.
    #[error("identity provider rejected request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Whether this is a deployment or infrastructure defect rather than
    /// ordinary rejected traffic.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_)
                | Self::UpstreamError(_)
                | Self::MalformedUpstreamResponse
                | Self::PasswordHash
                | Self::Repository(_)
        )
    }
}
