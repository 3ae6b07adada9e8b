//! Bearer credential to [`Principal`] resolution.
//!
//! Each call is an independent dispatch:
//! credential presented → verified (locally or by the provider) → resolved to
//! a local row, or rejected with an [`AuthError`] at any step.

use std::sync::Arc;

use driphub_core::{AuthMethod, Email, Principal};

use super::{AuthError, ShadowUserReconciler, TokenService};
use crate::config::ApiConfig;
use crate::db::UserStore;
use crate::identity::{IdentityError, IdentityProviderClient};

/// The authentication strategy in force for this process.
#[derive(Clone, Debug)]
pub enum AuthStrategy {
    /// Passwords verified here; tokens issued and decoded here.
    LocalCredential(TokenService),
    /// Tokens issued and verified by the hosted identity provider.
    DelegatedProvider(IdentityProviderClient),
}

impl AuthStrategy {
    /// Delegated whenever a provider base URL is configured, local otherwise.
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        if config.provider.is_delegated() {
            if config.provider.api_key().is_none() {
                tracing::error!(
                    "IDENTITY_PROVIDER_URL is set but no provider API key is configured; \
                     every authenticated request will fail"
                );
            }
            Self::DelegatedProvider(IdentityProviderClient::new(&config.provider))
        } else {
            Self::LocalCredential(TokenService::new(&config.token))
        }
    }

    /// The provider client, in delegated mode.
    #[must_use]
    pub const fn provider(&self) -> Option<&IdentityProviderClient> {
        match self {
            Self::DelegatedProvider(client) => Some(client),
            Self::LocalCredential(_) => None,
        }
    }

    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        match self {
            Self::LocalCredential(_) => AuthMethod::LocalToken,
            Self::DelegatedProvider(_) => AuthMethod::Delegated,
        }
    }
}

/// Map a provider failure onto the request-level taxonomy, logging
/// misconfiguration loudly and expected rejections quietly.
pub(crate) fn provider_failure(err: IdentityError) -> AuthError {
    if err.is_misconfiguration() {
        tracing::error!(error = %err, "Identity provider misconfigured");
        return AuthError::ConfigurationError(err.to_string());
    }

    if let IdentityError::InvalidToken { status } = err {
        tracing::debug!(status, "Provider rejected bearer token");
        return AuthError::InvalidCredential;
    }

    tracing::warn!(error = %err, "Identity provider call failed");
    AuthError::UpstreamError(err.to_string())
}

/// Resolves request credentials into principals.
#[derive(Clone)]
pub struct IdentityResolver {
    strategy: AuthStrategy,
    users: Arc<dyn UserStore>,
    reconciler: ShadowUserReconciler,
}

impl IdentityResolver {
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

    /// Resolve a bearer credential.
    ///
    /// `None` or an empty credential short-circuits with `NotAuthenticated`
    /// before any network or database work.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] kind; see the module documentation.
    pub async fn resolve(&self, credential: Option<&str>) -> Result<Principal, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;

        match &self.strategy {
            AuthStrategy::LocalCredential(tokens) => self.resolve_local(tokens, token).await,
            AuthStrategy::DelegatedProvider(client) => self.resolve_delegated(client, token).await,
        }
    }

    async fn resolve_local(&self, tokens: &TokenService, token: &str) -> Result<Principal, AuthError> {
        let subject = tokens.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Local token rejected");
            AuthError::InvalidCredential
        })?;

        let email = Email::parse(&subject).map_err(|e| {
            tracing::debug!(error = %e, "Local token subject is not an email");
            AuthError::InvalidCredential
        })?;

        let user = self.users.find_by_email(&email).await?.ok_or_else(|| {
            tracing::debug!(email = %email, "Local token for unknown account");
            AuthError::UserNotFound
        })?;

        Ok(Principal::local(user.id, user.email))
    }

    async fn resolve_delegated(
        &self,
        client: &IdentityProviderClient,
        token: &str,
    ) -> Result<Principal, AuthError> {
        let remote = client.verify_token(token).await.map_err(provider_failure)?;

        let Some(raw_email) = remote.email() else {
            tracing::warn!("Provider user object has no email");
            return Err(AuthError::MalformedUpstreamResponse);
        };
        let email = Email::parse(raw_email).map_err(|e| {
            tracing::warn!(error = %e, "Provider returned an unusable email");
            AuthError::MalformedUpstreamResponse
        })?;

        let user = self.reconciler.get_or_create(&email).await?;

        Ok(Principal::delegated(
            Some(user.id),
            email,
            remote.into_claims(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{IdentityProviderConfig, TokenConfig};
    use crate::db::InMemoryUserStore;
    use crate::models::NewUser;

    fn tokens() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: SecretString::from("k3J9x!vQ2m#Lp8Zr@Tw5Yb7Nc1Hd4Fg6".to_owned()),
            ttl: Duration::from_secs(60),
        })
    }

    fn delegated(base: &str) -> AuthStrategy {
        AuthStrategy::DelegatedProvider(IdentityProviderClient::new(&IdentityProviderConfig {
            base_url: Some(Url::parse(base).unwrap()),
            anon_key: Some(SecretString::from("anon")),
            ..IdentityProviderConfig::default()
        }))
    }

    async fn provider_returning(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(delegated("http://127.0.0.1:9"), store);
        assert!(matches!(
            resolver.resolve(None).await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            resolver.resolve(Some("  ")).await,
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_local_token_resolves_existing_user() {
        let store = Arc::new(InMemoryUserStore::new());
        let user = store
            .insert(&NewUser::with_password(Email::parse("a@x.com").unwrap(), "h".into()))
            .await
            .unwrap();
        let tokens = tokens();
        let token = tokens.issue("a@x.com").unwrap();
        let resolver = IdentityResolver::new(AuthStrategy::LocalCredential(tokens), store);

        let principal = resolver.resolve(Some(&token)).await.unwrap();
        assert_eq!(principal.local_user_id, Some(user.id));
        assert_eq!(principal.email.as_str(), "a@x.com");
        assert_eq!(principal.method, AuthMethod::LocalToken);
        assert!(principal.remote_claims.is_none());
    }

    #[tokio::test]
    async fn test_local_token_for_unknown_user() {
        let store = Arc::new(InMemoryUserStore::new());
        let tokens = tokens();
        let token = tokens.issue("ghost@x.com").unwrap();
        let resolver = IdentityResolver::new(AuthStrategy::LocalCredential(tokens), store.clone());

        assert!(matches!(
            resolver.resolve(Some(&token)).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bad_local_token_is_invalid_credential() {
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(AuthStrategy::LocalCredential(tokens()), store);
        assert!(matches!(
            resolver.resolve(Some("garbage")).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_delegated_rejection_inserts_nothing() {
        let server = provider_returning(401, json!({"msg": "invalid JWT"})).await;
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(delegated(&server.uri()), store.clone());

        assert!(matches!(
            resolver.resolve(Some("bad")).await,
            Err(AuthError::InvalidCredential)
        ));
        assert_eq!(store.insert_count(), 0);
    }

    #[tokio::test]
    async fn test_delegated_first_sight_creates_one_row() {
        let server = provider_returning(200, json!({"id": "u1", "email": "new@x.com"})).await;
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(delegated(&server.uri()), store.clone());

        let first = resolver.resolve(Some("good")).await.unwrap();
        let second = resolver.resolve(Some("good")).await.unwrap();

        let row = store
            .find_by_email(&Email::parse("new@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.local_user_id, Some(row.id));
        assert_eq!(second.local_user_id, Some(row.id));
        assert_eq!(first.method, AuthMethod::Delegated);
        assert_eq!(first.remote_subject(), Some("u1"));
        assert_eq!(store.insert_count(), 1);
    }

    #[tokio::test]
    async fn test_delegated_missing_email_is_malformed() {
        let server = provider_returning(200, json!({"id": "u1"})).await;
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(delegated(&server.uri()), store.clone());

        assert!(matches!(
            resolver.resolve(Some("good")).await,
            Err(AuthError::MalformedUpstreamResponse)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delegated_unreachable_is_upstream_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let store = Arc::new(InMemoryUserStore::new());
        let resolver =
            IdentityResolver::new(delegated(&format!("http://127.0.0.1:{port}")), store);

        assert!(matches!(
            resolver.resolve(Some("tok")).await,
            Err(AuthError::UpstreamError(_))
        ));
    }

    #[tokio::test]
    async fn test_delegated_without_api_key_is_configuration_error() {
        let strategy = AuthStrategy::DelegatedProvider(IdentityProviderClient::new(
            &IdentityProviderConfig {
                base_url: Some(Url::parse("http://127.0.0.1:9").unwrap()),
                ..IdentityProviderConfig::default()
            },
        ));
        let resolver = IdentityResolver::new(strategy, Arc::new(InMemoryUserStore::new()));

        assert!(matches!(
            resolver.resolve(Some("tok")).await,
            Err(AuthError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_hung_provider_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "u1", "email": "slow@x.com"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let strategy = AuthStrategy::DelegatedProvider(IdentityProviderClient::new(
            &IdentityProviderConfig {
                base_url: Some(Url::parse(&server.uri()).unwrap()),
                anon_key: Some(SecretString::from("anon")),
                request_timeout: Duration::from_millis(300),
                ..IdentityProviderConfig::default()
            },
        ));
        let store = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(strategy, store.clone());

        assert!(matches!(
            resolver.resolve(Some("good")).await,
            Err(AuthError::UpstreamError(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_provider_failure_mapping() {
        assert!(matches!(
            provider_failure(IdentityError::InvalidToken { status: 403 }),
            AuthError::InvalidCredential
        ));
        assert!(matches!(
            provider_failure(IdentityError::UnexpectedResponse("not json".into())),
            AuthError::UpstreamError(_)
        ));
        assert!(matches!(
            provider_failure(IdentityError::MissingPrivilegedCredential),
            AuthError::ConfigurationError(_)
        ));
        assert!(matches!(
            provider_failure(IdentityError::NotConfigured("base URL missing")),
            AuthError::ConfigurationError(_)
        ));
    }
}
