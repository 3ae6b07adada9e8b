//! The normalized authenticated identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Email, UserId};

/// Which strategy authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Locally issued, locally verified access token.
    LocalToken,
    /// Bearer token verified by the remote identity provider.
    Delegated,
}

/// An authenticated identity, derived per request and never persisted.
///
/// `email` is always present. `local_user_id` is the join into local relational
/// data; `remote_claims` carries the provider's user object for delegated
/// requests only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Local `users.id`, if a row exists for this identity.
    pub local_user_id: Option<UserId>,
    /// Verified email address.
    pub email: Email,
    /// How the request was authenticated.
    pub method: AuthMethod,
    /// Raw provider user object (delegated strategy only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_claims: Option<Map<String, Value>>,
}

impl Principal {
    /// Principal for a locally issued token that resolved to an existing row.
    #[must_use]
    pub const fn local(user_id: UserId, email: Email) -> Self {
        Self {
            local_user_id: Some(user_id),
            email,
            method: AuthMethod::LocalToken,
            remote_claims: None,
        }
    }

    /// Principal for a provider-verified identity.
    #[must_use]
    pub const fn delegated(
        local_user_id: Option<UserId>,
        email: Email,
        claims: Map<String, Value>,
    ) -> Self {
        Self {
            local_user_id,
            email,
            method: AuthMethod::Delegated,
            remote_claims: Some(claims),
        }
    }

    /// Returns the provider's `sub`/`id` claim when present.
    #[must_use]
    pub fn remote_subject(&self) -> Option<&str> {
        let claims = self.remote_claims.as_ref()?;
        claims
            .get("id")
            .or_else(|| claims.get("sub"))
            .and_then(Value::as_str)
    }
}
