//! Identity provider commands.
//!
//! # Usage
//!
//! ```bash
//! # Probe the provider
//! driphub-cli provider health
//!
//! # Create a pre-confirmed account with the service-role key
//! driphub-cli provider create-user -e test@example.com -p 'pw' --auto-confirm
//! ```
//!
//! # Environment Variables
//!
//! - `IDENTITY_PROVIDER_URL` - Provider base URL
//! - `IDENTITY_PROVIDER_ANON_KEY` - Public API key
//! - `IDENTITY_PROVIDER_SERVICE_ROLE_KEY` - Required for `create-user`

use thiserror::Error;

use driphub_api::config::{ConfigError, IdentityProviderConfig};
use driphub_api::identity::{IdentityError, IdentityProviderClient};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IDENTITY_PROVIDER_URL is not set")]
    NotConfigured,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Provider refused the request with status {0}")]
    Rejected(u16),
}

fn client() -> Result<IdentityProviderClient, ProviderError> {
    let config = IdentityProviderConfig::from_env()?;
    if !config.is_delegated() {
        return Err(ProviderError::NotConfigured);
    }
    Ok(IdentityProviderClient::new(&config))
}

/// Probe the provider and print which path answered.
///
/// # Errors
///
/// Returns `ProviderError` if unconfigured or unreachable.
pub async fn health() -> Result<(), ProviderError> {
    let report = client()?.health_check().await?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "reachable via {:?} (status {}, ok={})",
            report.path, report.status_code, report.ok
        );
    }
    Ok(())
}

/// Create an account through the privileged admin endpoint and print the
/// provider's response.
///
/// # Errors
///
/// Returns `ProviderError` if unconfigured, the service-role key is missing,
/// the provider is unreachable, or the provider answers non-2xx.
pub async fn create_user(
    email: &str,
    password: &str,
    auto_confirm: bool,
) -> Result<(), ProviderError> {
    let response = client()?
        .admin_create_user(email, password, auto_confirm)
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("status: {}", response.status);
        println!(
            "{}",
            serde_json::to_string_pretty(&response.body).unwrap_or_default()
        );
    }

    if response.is_success() {
        Ok(())
    } else {
        Err(ProviderError::Rejected(response.status))
    }
}
