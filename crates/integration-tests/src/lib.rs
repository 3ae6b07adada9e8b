//! End-to-end test harness for the DripHub API.
//!
//! Each [`TestServer`] serves the real router on an ephemeral port, backed by
//! an in-memory user store (or Postgres for the ignored database tests), and is
//! driven over HTTP with `reqwest`. Delegated-mode tests point the server at a
//! `wiremock` stand-in for the identity provider.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p driphub-integration-tests
//!
//! # Including Postgres-backed tests
//! DRIPHUB_TEST_DATABASE_URL=postgres://... \
//!     cargo test -p driphub-integration-tests -- --include-ignored
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use driphub_api::config::{ApiConfig, IdentityProviderConfig, TokenConfig};
use driphub_api::db::{InMemoryUserStore, UserStore};
use driphub_api::services::auth::TokenService;
use driphub_api::{AppState, router};

/// Signing secret shared by servers and assertions in tests.
pub const TEST_TOKEN_SECRET: &str = "k3J9x!vQ2m#Lp8Zr@Tw5Yb7Nc1Hd4Fg6";

/// Public key the mocked provider expects in the `apikey` header.
pub const TEST_ANON_KEY: &str = "test-anon-key";

/// Token configuration used by every test server.
#[must_use]
pub fn token_config() -> TokenConfig {
    TokenConfig {
        secret: SecretString::from(TEST_TOKEN_SECRET),
        ttl: Duration::from_secs(30 * 60),
    }
}

/// A token service that agrees with the test servers' signing key.
#[must_use]
pub fn token_service() -> TokenService {
    TokenService::new(&token_config())
}

/// Provider configuration pointing at `base_url`.
///
/// # Panics
///
/// Panics if `base_url` is not a valid URL.
#[must_use]
pub fn provider_config(base_url: &str) -> IdentityProviderConfig {
    IdentityProviderConfig {
        base_url: Some(Url::parse(base_url).expect("invalid provider URL")),
        anon_key: Some(SecretString::from(TEST_ANON_KEY)),
        ..IdentityProviderConfig::default()
    }
}

/// A URL on which nothing is listening.
///
/// # Panics
///
/// Panics if an ephemeral port cannot be bound.
#[must_use]
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// A running API server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub users: Arc<dyn UserStore>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Local-credential strategy over an in-memory store.
    pub async fn local() -> (Self, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        let server = Self::start(ApiConfig::in_memory(token_config()), store.clone()).await;
        (server, store)
    }

    /// Delegated-provider strategy against `provider_url`, over an in-memory
    /// store.
    pub async fn delegated(provider_url: &str) -> (Self, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        let config = ApiConfig::in_memory(token_config()).with_provider(provider_config(provider_url));
        let server = Self::start(config, store.clone()).await;
        (server, store)
    }

    /// Serve the router for `config` over `users` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(config: ApiConfig, users: Arc<dyn UserStore>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let app = router(AppState::with_store(config, Arc::clone(&users)));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            client: Client::new(),
            users,
            handle,
        }
    }

    /// Absolute URL for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `POST` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics on transport failure.
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    /// `GET` with an optional bearer token.
    ///
    /// # Panics
    ///
    /// Panics on transport failure.
    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read a JSON response body.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn body_json(response: Response) -> Value {
    response.json().await.expect("response body is not JSON")
}
