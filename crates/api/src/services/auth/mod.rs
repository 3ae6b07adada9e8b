//! Authentication service.
//!
//! Registration and login under whichever [`AuthStrategy`] is configured, plus
//! the per-request [`IdentityResolver`].

mod error;
mod password;
mod reconciler;
mod resolver;
mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use reconciler::ShadowUserReconciler;
pub use resolver::{AuthStrategy, IdentityResolver};
pub use token::{AccessClaims, TokenError, TokenService};

use std::sync::Arc;

use driphub_core::Email;

use crate::db::{RepositoryError, UserStore};
use crate::identity::IdentityProviderClient;
use crate::models::{NewUser, User};
use resolver::provider_failure;

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Ready-to-use session token. `None` when the provider created the
    /// account without signing it in.
    pub access_token: Option<String>,
}

/// Authentication service.
///
/// Handles registration and login for the configured strategy.
#[derive(Clone)]
pub struct AuthService {
    strategy: AuthStrategy,
    users: Arc<dyn UserStore>,
    reconciler: ShadowUserReconciler,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(strategy: AuthStrategy, users: Arc<dyn UserStore>) -> Self {
        Self {
            reconciler: ShadowUserReconciler::new(Arc::clone(&users)),
            strategy,
            users,
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `InvalidEmail` / `EmptyPassword` on bad input
    /// - `ConflictOnCreate` if the email is already registered locally
    /// - `ProviderRejected` if the provider refused the sign-up
    /// - `UpstreamError` / `ConfigurationError` for provider failures
    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        match &self.strategy {
            AuthStrategy::LocalCredential(tokens) => {
                let user = self.create_local_user(email, password, false).await?;
                let access_token = tokens
                    .issue(user.email.as_str())
                    .map_err(|e| AuthError::ConfigurationError(e.to_string()))?;

                tracing::info!(user_id = %user.id, "Registered local user");
                Ok(Registration {
                    user,
                    access_token: Some(access_token),
                })
            }
            AuthStrategy::DelegatedProvider(client) => {
                self.register_with_provider(client, email, password).await
            }
        }
    }

    async fn register_with_provider(
        &self,
        client: &IdentityProviderClient,
        email: Email,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let response = client
            .sign_up(email.as_str(), password)
            .await
            .map_err(provider_failure)?;

        if !response.is_success() {
            tracing::debug!(status = response.status, "Provider refused sign-up");
            return Err(AuthError::ProviderRejected {
                status: response.status,
                message: response.error_message(),
            });
        }

        let user = self.reconciler.get_or_create(&email).await?;
        let access_token = response.access_token().map(str::to_owned);
        if access_token.is_none() {
            tracing::debug!(user_id = %user.id, "Provider created account without a session");
        }

        Ok(Registration { user, access_token })
    }

    /// Insert a password account directly, whatever the configured strategy.
    ///
    /// # Errors
    ///
    /// `ConflictOnCreate` on duplicate email, `PasswordHash` or `Repository`
    /// otherwise.
    pub async fn create_local_user(
        &self,
        email: Email,
        password: &str,
        is_superuser: bool,
    ) -> Result<User, AuthError> {
        create_local_user(self.users.as_ref(), email, password, is_superuser).await
    }

    /// Exchange email and password for an access token.
    ///
    /// # Errors
    ///
    /// `InvalidCredential` for any credential mismatch, including accounts
    /// with no local password; provider and database failures otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        match &self.strategy {
            AuthStrategy::LocalCredential(tokens) => {
                let email = Email::parse(email).map_err(|_| AuthError::InvalidCredential)?;
                let user = self
                    .users
                    .find_by_email(&email)
                    .await?
                    .ok_or(AuthError::InvalidCredential)?;

                if !user.is_active || !verify_password(password, &user.password_hash) {
                    tracing::debug!(user_id = %user.id, "Password login rejected");
                    return Err(AuthError::InvalidCredential);
                }

                tokens
                    .issue(user.email.as_str())
                    .map_err(|e| AuthError::ConfigurationError(e.to_string()))
            }
            AuthStrategy::DelegatedProvider(client) => {
                let response = client
                    .sign_in(email, password)
                    .await
                    .map_err(provider_failure)?;

                if !response.is_success() {
                    tracing::debug!(status = response.status, "Provider refused sign-in");
                    return Err(AuthError::InvalidCredential);
                }

                response
                    .access_token()
                    .map(str::to_owned)
                    .ok_or(AuthError::InvalidCredential)
            }
        }
    }
}

/// Hash `password` and insert a local account into `users`.
///
/// Used by [`AuthService`] and by provisioning tools that have a store but no
/// token configuration.
///
/// # Errors
///
/// `EmptyPassword`, `ConflictOnCreate` on duplicate email, `PasswordHash` or
/// `Repository` otherwise.
pub async fn create_local_user(
    users: &dyn UserStore,
    email: Email,
    password: &str,
    is_superuser: bool,
) -> Result<User, AuthError> {
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let new_user = NewUser {
        is_superuser,
        ..NewUser::with_password(email, password_hash)
    };

    users.insert(&new_user).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => AuthError::ConflictOnCreate,
        other => AuthError::Repository(other),
    })
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }
    Ok(())
}
