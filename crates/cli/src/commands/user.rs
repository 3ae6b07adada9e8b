//! Local user management.
//!
//! # Usage
//!
//! ```bash
//! driphub-cli user create -e admin@example.com -p 'hunter2!' --superuser
//! ```

use thiserror::Error;

use driphub_api::config::{self, ConfigError};
use driphub_api::db::{self, UserRepository};
use driphub_api::services::auth::{self, AuthError};
use driphub_core::{Email, EmailError};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Insert a password account directly into the database.
///
/// # Errors
///
/// Returns `UserError` on invalid input, duplicate email, or database failure.
pub async fn create(email: &str, password: &str, superuser: bool) -> Result<(), UserError> {
    let email = Email::parse(email)?;

    let database_url = config::database_url_from_env()?;
    let pool = db::create_pool(&database_url).await?;
    let users = UserRepository::new(pool);

    let user = auth::create_local_user(&users, email.clone(), password, superuser)
        .await
        .map_err(|e| match e {
            AuthError::ConflictOnCreate => UserError::UserExists(email.to_string()),
            other => UserError::Auth(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, superuser, "User created");
    Ok(())
}
