//! Hosted identity provider client.
//!
//! Talks to a GoTrue-style auth API:
//!
//! | Operation | Request |
//! |---|---|
//! | verify | `GET /auth/v1/user` with the caller's bearer token |
//! | sign up | `POST /auth/v1/signup` |
//! | sign in | `POST /auth/v1/token?grant_type=password` |
//! | admin create | `POST /auth/v1/admin/users` with the service-role key |
//!
//! Every call sends an `apikey` header. Failures are classified so callers can
//! tell a bad credential ([`IdentityError::InvalidToken`]) from a provider that
//! could not be reached ([`IdentityError::Unreachable`]) or a local
//! misconfiguration ([`IdentityError::NotConfigured`]).

mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::IdentityProviderConfig;

/// Paths tried in order by [`IdentityProviderClient::health_check`].
const HEALTH_PATHS: [&str; 3] = ["/health", "/", ""];

/// Errors from identity provider calls.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Base URL or API key missing; raised before any network attempt.
    #[error("identity provider not configured: {0}")]
    NotConfigured(&'static str),

    /// The service-role key is required for this call but absent.
    #[error("identity provider service-role key not configured")]
    MissingPrivilegedCredential,

    /// The provider answered but did not accept the token.
    #[error("token rejected by identity provider (status {status})")]
    InvalidToken { status: u16 },

    /// DNS, connect, or timeout failure.
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered 200 with a body we could not interpret.
    #[error("unexpected identity provider response: {0}")]
    UnexpectedResponse(String),
}

impl IdentityError {
    /// Whether this reflects local configuration rather than the provider
    /// or the caller.
    #[must_use]
    pub const fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured(_) | Self::MissingPrivilegedCredential
        )
    }
}

fn unreachable(e: &reqwest::Error) -> IdentityError {
    IdentityError::Unreachable(e.to_string())
}

/// Client for the hosted identity provider.
#[derive(Clone)]
pub struct IdentityProviderClient {
    inner: Arc<IdentityProviderClientInner>,
}

struct IdentityProviderClientInner {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    service_role_key: Option<String>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl std::fmt::Debug for IdentityProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProviderClient")
            .field("base_url", &self.inner.base_url)
            .field("api_key", &self.inner.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "service_role_key",
                &self.inner.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl IdentityProviderClient {
    /// Create a client from configuration. No network activity happens here.
    #[must_use]
    pub fn new(config: &IdentityProviderConfig) -> Self {
        Self {
            inner: Arc::new(IdentityProviderClientInner {
                client: reqwest::Client::new(),
                base_url: config
                    .base_url
                    .as_ref()
                    .map(|u| Url::as_str(u).trim_end_matches('/').to_owned()),
                api_key: config.api_key().map(|k| k.expose_secret().to_owned()),
                service_role_key: config
                    .service_role_key
                    .as_ref()
                    .map(|k| k.expose_secret().to_owned()),
                request_timeout: config.request_timeout,
                health_timeout: config.health_timeout,
            }),
        }
    }

    fn base(&self) -> Result<&str, IdentityError> {
        self.inner
            .base_url
            .as_deref()
            .ok_or(IdentityError::NotConfigured("base URL missing"))
    }

    /// Base URL and API key, both required for every auth call.
    fn endpoint(&self, path: &str) -> Result<(String, &str), IdentityError> {
        let base = self.base()?;
        let key = self
            .inner
            .api_key
            .as_deref()
            .ok_or(IdentityError::NotConfigured("API key missing"))?;
        Ok((format!("{base}{path}"), key))
    }

    /// Verify a bearer token and return the provider's user object.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if base URL or API key is absent
    /// - `Unreachable` on transport failure or timeout
    /// - `InvalidToken` on any non-200 status
    /// - `UnexpectedResponse` if the 200 body is not a JSON object
    #[instrument(skip_all)]
    pub async fn verify_token(&self, bearer_token: &str) -> Result<ProviderUser, IdentityError> {
        let (url, key) = self.endpoint("/auth/v1/user")?;

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(bearer_token)
            .header("apikey", key)
            .timeout(self.inner.request_timeout)
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(IdentityError::InvalidToken { status });
        }

        let body = response.text().await.map_err(|e| unreachable(&e))?;
        serde_json::from_str::<ProviderUser>(&body)
            .map_err(|e| IdentityError::UnexpectedResponse(e.to_string()))
    }

    /// Register an account with the provider.
    ///
    /// # Errors
    ///
    /// `NotConfigured` or `Unreachable`; provider refusals come back as a
    /// non-success [`ProviderResponse`].
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderResponse, IdentityError> {
        let (url, key) = self.endpoint("/auth/v1/signup")?;
        self.post(&url, key, key, &json!({ "email": email, "password": password }))
            .await
    }

    /// Exchange email and password for a provider session.
    ///
    /// # Errors
    ///
    /// `NotConfigured` or `Unreachable`; bad credentials come back as a
    /// non-success [`ProviderResponse`].
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderResponse, IdentityError> {
        let (url, key) = self.endpoint("/auth/v1/token?grant_type=password")?;
        self.post(&url, key, key, &json!({ "email": email, "password": password }))
            .await
    }

    /// Create an account through the privileged admin endpoint.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if the base URL is absent
    /// - `MissingPrivilegedCredential` if no service-role key is configured,
    ///   whether or not the public key is present
    /// - `Unreachable` on transport failure
    #[instrument(skip(self, password))]
    pub async fn admin_create_user(
        &self,
        email: &str,
        password: &str,
        auto_confirm: bool,
    ) -> Result<ProviderResponse, IdentityError> {
        let base = self.base()?;
        let service_key = self
            .inner
            .service_role_key
            .as_deref()
            .ok_or(IdentityError::MissingPrivilegedCredential)?;

        let url = format!("{base}/auth/v1/admin/users");
        let body = json!({
            "email": email,
            "password": password,
            "email_confirm": auto_confirm,
        });
        self.post(&url, service_key, service_key, &body).await
    }

    async fn post(
        &self,
        url: &str,
        api_key: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<ProviderResponse, IdentityError> {
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(bearer)
            .header("apikey", api_key)
            .json(body)
            .timeout(self.inner.request_timeout)
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| unreachable(&e))?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ProviderResponse { status, body })
    }

    /// Probe the provider, returning the first candidate path that answers
    /// with any status.
    ///
    /// Only the base URL is required. Advisory only; never gates startup.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a base URL, `Unreachable` if no path answers.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<HealthReport, IdentityError> {
        let base = self.base()?;
        let mut last_error = String::from("no candidate paths");

        for path in HEALTH_PATHS {
            let mut request = self
                .inner
                .client
                .get(format!("{base}{path}"))
                .timeout(self.inner.health_timeout);
            if let Some(key) = self.inner.api_key.as_deref() {
                request = request.header("apikey", key);
            }

            match request.send().await {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    return Ok(HealthReport {
                        reachable: true,
                        path: path.to_owned(),
                        status_code,
                        ok: status_code == 200,
                    });
                }
                Err(e) => {
                    tracing::debug!(path, error = %e, "Health probe path failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(IdentityError::Unreachable(last_error))
    }
}
