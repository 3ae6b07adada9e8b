//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{UserRepository, UserStore};
use crate::identity::IdentityProviderClient;
use crate::services::auth::{AuthService, AuthStrategy, IdentityResolver};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the user store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    users: Arc<dyn UserStore>,
    auth: AuthService,
    resolver: IdentityResolver,
}

impl AppState {
    /// Create application state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        Self::with_store(config, Arc::new(UserRepository::new(pool)))
    }

    /// Create application state over any user store.
    #[must_use]
    pub fn with_store(config: ApiConfig, users: Arc<dyn UserStore>) -> Self {
        let strategy = AuthStrategy::from_config(&config);
        tracing::info!(method = ?strategy.method(), "Authentication strategy selected");

        let auth = AuthService::new(strategy.clone(), Arc::clone(&users));
        let resolver = IdentityResolver::new(strategy, Arc::clone(&users));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                auth,
                resolver,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get the user store.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.inner.resolver
    }

    /// The identity provider client, when running in delegated mode.
    #[must_use]
    pub fn provider(&self) -> Option<&IdentityProviderClient> {
        self.inner.auth.strategy().provider()
    }
}
