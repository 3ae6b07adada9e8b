//! Locally issued access tokens (HS256 JWT).
//!
//! Tokens carry only the subject email plus `iat`/`exp`. Expiry is checked
//! against an explicit clock so callers and tests control "now".

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;

/// Claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the account email.
    pub sub: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
}

/// Why a token failed to decode.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims are malformed")]
    MalformedClaims,

    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Issues and decodes access tokens with a process-wide signing key.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `decode_at` against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: i64::try_from(config.ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for `subject` valid from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token for `subject` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = AccessClaims {
            sub: subject.to_owned(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Decode a token and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature`, `Expired` or `MalformedClaims`.
    pub fn decode(&self, token: &str) -> Result<String, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Decode a token against the clock value `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature`, `Expired` or `MalformedClaims`.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::MalformedClaims,
            },
        )?;

        if now.timestamp() > data.claims.exp {
            return Err(TokenError::Expired);
        }
        if data.claims.sub.is_empty() {
            return Err(TokenError::MalformedClaims);
        }

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;

    const SECRET: &str = "k3J9x!vQ2m#Lp8Zr@Tw5Yb7Nc1Hd4Fg6";

    fn service(secret: &str) -> TokenService {
        TokenService::new(&TokenConfig {
            secret: SecretString::from(secret.to_owned()),
            ttl: Duration::from_secs(30 * 60),
        })
    }

    #[test]
    fn test_decode_returns_subject_right_after_issue() {
        let tokens = service(SECRET);
        let token = tokens.issue("a@x.com").unwrap();
        assert_eq!(tokens.decode(&token).unwrap(), "a@x.com");
    }

    #[test]
    fn test_expired_once_clock_passes_ttl() {
        let tokens = service(SECRET);
        let issued = Utc::now();
        let token = tokens.issue_at("a@x.com", issued).unwrap();

        let at_expiry = issued + TimeDelta::seconds(tokens.ttl_secs());
        assert_eq!(tokens.decode_at(&token, at_expiry).unwrap(), "a@x.com");

        let after = at_expiry + TimeDelta::seconds(1);
        assert!(matches!(
            tokens.decode_at(&token, after),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_other_key_is_invalid_signature() {
        let token = service(SECRET).issue("a@x.com").unwrap();
        let other = service("Zq8#mW2!pL5@rT9$vB3%nC7^xD1&fG4*");
        assert!(matches!(
            other.decode(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_subject_is_malformed() {
        let tokens = service(SECRET);
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "iat": now, "exp": now + 60 }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            tokens.decode(&token),
            Err(TokenError::MalformedClaims)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            service(SECRET).decode("not.a.jwt"),
            Err(TokenError::MalformedClaims)
        ));
    }
}
