//! DripHub API server.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` for local users (or the in-memory store with
//!   `DRIPHUB_DATABASE_URL=memory://`)
//! - Optional hosted identity provider; when `IDENTITY_PROVIDER_URL` is set,
//!   bearer tokens are verified remotely and shadow users are created locally

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driphub_api::config::ApiConfig;
use driphub_api::db::{self, InMemoryUserStore};
use driphub_api::identity::IdentityProviderClient;
use driphub_api::{AppState, router};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Build state over Postgres, running migrations unless `SKIP_DB_INIT`.
async fn postgres_state(config: ApiConfig) -> AppState {
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    if config.skip_db_init {
        tracing::info!("SKIP_DB_INIT set; not running migrations");
    } else if let Err(e) = db::run_migrations(&pool).await {
        tracing::warn!(error = %e, "Database migrations failed; continuing");
    } else {
        tracing::info!("Database migrations applied");
    }

    AppState::new(config, pool)
}

/// Log provider reachability once at startup. Never blocks serving.
fn spawn_provider_probe(client: IdentityProviderClient) {
    tokio::spawn(async move {
        match client.health_check().await {
            Ok(report) => tracing::info!(
                path = %report.path,
                status = report.status_code,
                "Identity provider reachable"
            ),
            Err(e) => tracing::warn!(error = %e, "Identity provider health probe failed"),
        }
    });
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "driphub_api=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if config.sentry_dsn.is_some() {
        tracing::info!("Sentry initialized");
    }

    let addr = config.socket_addr();
    let state = if config.uses_in_memory_store() {
        tracing::warn!("Using in-memory user store; accounts are lost on restart");
        AppState::with_store(config, Arc::new(InMemoryUserStore::new()))
    } else {
        postgres_state(config).await
    };

    if let Some(client) = state.provider() {
        spawn_provider_probe(client.clone());
    }

    let app = router(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    tracing::info!("driphub-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
