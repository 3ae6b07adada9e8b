//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use driphub_core::{Email, UserId};

/// A local user row (domain type).
///
/// Either registered with a password (argon2 hash) or materialized as a
/// shadow of a delegated identity (empty hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address (unique).
    pub email: Email,
    /// Encoded argon2 hash, or empty when the account has no local password.
    pub password_hash: String,
    /// Whether the account may sign in.
    pub is_active: bool,
    /// Whether the account has administrative rights.
    pub is_superuser: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this account can authenticate with a local password.
    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// Values for inserting a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub is_superuser: bool,
}

impl NewUser {
    /// A locally registered account.
    #[must_use]
    pub const fn with_password(email: Email, password_hash: String) -> Self {
        Self {
            email,
            password_hash,
            is_superuser: false,
        }
    }

    /// A shadow account for a delegated identity: no local password.
    #[must_use]
    pub const fn shadow(email: Email) -> Self {
        Self {
            email,
            password_hash: String::new(),
            is_superuser: false,
        }
    }
}

/// Public representation of a user in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
        }
    }
}
