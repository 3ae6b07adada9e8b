//! Identity provider response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The provider's user object, as returned by the "who am I" endpoint.
///
/// Kept as an opaque claim map; only `email` is interpreted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderUser(Map<String, Value>);

impl ProviderUser {
    #[must_use]
    pub const fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The verified email, if the provider included a non-empty one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.0
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
    }

    #[must_use]
    pub fn into_claims(self) -> Map<String, Value> {
        self.0
    }
}

/// Raw status and body of a sign-up, sign-in or admin call.
///
/// The body is JSON when the provider sent JSON, otherwise the raw text as a
/// JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

impl ProviderResponse {
    /// 200 and 201 count as success; the body may still carry an error
    /// envelope.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }

    /// The session access token, when the provider issued one.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// The user object, either top-level or nested under `user`.
    #[must_use]
    pub fn user(&self) -> Option<ProviderUser> {
        let obj = self
            .body
            .get("user")
            .and_then(Value::as_object)
            .or_else(|| self.body.as_object())?;
        Some(ProviderUser::new(obj.clone()))
    }

    /// Best-effort human-readable error from the provider body.
    #[must_use]
    pub fn error_message(&self) -> String {
        ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .map_or_else(
                || match &self.body {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                },
                str::to_owned,
            )
    }
}

/// Outcome of a provider health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always true; an unreachable provider is reported as an error.
    pub reachable: bool,
    /// The candidate path that answered.
    pub path: String,
    pub status_code: u16,
    /// Whether the answering path returned 200.
    pub ok: bool,
}
