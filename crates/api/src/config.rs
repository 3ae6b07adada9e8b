//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DRIPHUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `DRIPHUB_TOKEN_SECRET` - Access token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `DRIPHUB_HOST` - Bind address (default: 127.0.0.1)
//! - `DRIPHUB_PORT` - Listen port (default: 8000)
//! - `DRIPHUB_API_PREFIX` - Route prefix (default: /api)
//! - `DRIPHUB_TOKEN_TTL_MINUTES` - Access token lifetime (default: 30)
//! - `IDENTITY_PROVIDER_URL` - Hosted auth provider base URL; enables delegated mode
//! - `IDENTITY_PROVIDER_ANON_KEY` - Provider public API key
//! - `IDENTITY_PROVIDER_SERVICE_ROLE_KEY` - Provider privileged key
//! - `IDENTITY_PROVIDER_TIMEOUT_SECS` - Auth call timeout (default: 10)
//! - `IDENTITY_PROVIDER_HEALTH_TIMEOUT_SECS` - Health probe timeout (default: 5)
//! - `SKIP_DB_INIT` - Skip migrations on startup (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_TOKEN_TTL_MINUTES: u64 = 30;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROVIDER_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Database URL that selects the in-memory user store instead of Postgres.
pub const IN_MEMORY_DATABASE_URL: &str = "memory://";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-this",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Process-wide API configuration. Read-only after startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Prefix for the REST routes (e.g. `/api`)
    pub api_prefix: String,
    /// Skip running embedded migrations on startup
    pub skip_db_init: bool,
    /// Local access token settings
    pub token: TokenConfig,
    /// Remote identity provider settings
    pub provider: IdentityProviderConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Local access token configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// HS256 signing secret. Rotating it invalidates every issued token.
    pub secret: SecretString,
    /// Token lifetime.
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Remote identity provider configuration.
///
/// Delegated mode is active whenever `base_url` is set.
#[derive(Clone)]
pub struct IdentityProviderConfig {
    /// Provider base URL (e.g. `https://abc.supabase.co`)
    pub base_url: Option<Url>,
    /// Public API key sent as the `apikey` header
    pub anon_key: Option<SecretString>,
    /// Privileged key for admin operations
    pub service_role_key: Option<SecretString>,
    /// Timeout for verify/sign-up/sign-in/admin calls
    pub request_timeout: Duration,
    /// Timeout for each health probe attempt
    pub health_timeout: Duration,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            anon_key: None,
            service_role_key: None,
            request_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_PROVIDER_HEALTH_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("IdentityProviderConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("anon_key", &redact(&self.anon_key))
            .field("service_role_key", &redact(&self.service_role_key))
            .field("request_timeout", &self.request_timeout)
            .field("health_timeout", &self.health_timeout)
            .finish()
    }
}

impl IdentityProviderConfig {
    /// Whether requests should be authenticated by the remote provider.
    #[must_use]
    pub const fn is_delegated(&self) -> bool {
        self.base_url.is_some()
    }

    /// Key used for the `apikey` header: the anon key, else the service key.
    #[must_use]
    pub fn api_key(&self) -> Option<&SecretString> {
        self.anon_key.as_ref().or(self.service_role_key.as_ref())
    }

    /// Load the `IDENTITY_PROVIDER_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for an unparseable URL or timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_optional_env("IDENTITY_PROVIDER_URL")
            .map(|raw| {
                Url::parse(raw.trim_end_matches('/')).map_err(|e| {
                    ConfigError::InvalidEnvVar("IDENTITY_PROVIDER_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            base_url,
            anon_key: get_optional_env("IDENTITY_PROVIDER_ANON_KEY").map(SecretString::from),
            service_role_key: get_optional_env("IDENTITY_PROVIDER_SERVICE_ROLE_KEY")
                .map(SecretString::from),
            request_timeout: Duration::from_secs(get_parsed_or_default(
                "IDENTITY_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?),
            health_timeout: Duration::from_secs(get_parsed_or_default(
                "IDENTITY_PROVIDER_HEALTH_TIMEOUT_SECS",
                DEFAULT_PROVIDER_HEALTH_TIMEOUT_SECS,
            )?),
        })
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the token secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("DRIPHUB_DATABASE_URL")?;
        let host = get_env_or_default("DRIPHUB_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DRIPHUB_HOST".to_string(), e.to_string()))?;
        let port = get_parsed_or_default("DRIPHUB_PORT", 8000_u16)?;
        let api_prefix = normalize_prefix(&get_env_or_default("DRIPHUB_API_PREFIX", "/api"));
        let skip_db_init = get_bool_env("SKIP_DB_INIT");

        let secret = get_validated_secret("DRIPHUB_TOKEN_SECRET")?;
        validate_secret_length(&secret, "DRIPHUB_TOKEN_SECRET")?;
        let ttl_minutes = get_parsed_or_default("DRIPHUB_TOKEN_TTL_MINUTES", DEFAULT_TOKEN_TTL_MINUTES)?;
        let token = TokenConfig {
            secret,
            ttl: token_ttl(ttl_minutes)?,
        };

        let provider = IdentityProviderConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            api_prefix,
            skip_db_init,
            token,
            provider,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", 1.0_f32)?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0_f32)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Defaults for embedding the router in-process: in-memory users, local
    /// strategy, no Sentry.
    #[must_use]
    pub fn in_memory(token: TokenConfig) -> Self {
        Self {
            database_url: SecretString::from(IN_MEMORY_DATABASE_URL),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            api_prefix: "/api".to_string(),
            skip_db_init: true,
            token,
            provider: IdentityProviderConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Switch to delegated mode against `provider`.
    #[must_use]
    pub fn with_provider(mut self, provider: IdentityProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Whether the database URL selects the in-memory user store.
    #[must_use]
    pub fn uses_in_memory_store(&self) -> bool {
        self.database_url.expose_secret() == IN_MEMORY_DATABASE_URL
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Convert `DRIPHUB_TOKEN_TTL_MINUTES` to a duration, rejecting overflow.
fn token_ttl(minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "DRIPHUB_TOKEN_TTL_MINUTES".to_string(),
                format!("{minutes} minutes is out of range"),
            )
        })
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Database URL from `DRIPHUB_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    get_database_url("DRIPHUB_DATABASE_URL")
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Interpret `1`, `true` and `yes` (any case) as true.
fn get_bool_env(key: &str) -> bool {
    get_optional_env(key).is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Ensure the prefix starts with `/` and has no trailing `/`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
