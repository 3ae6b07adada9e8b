//! Authentication extractors.
//!
//! Provides extractors for requiring a resolved [`Principal`] in route handlers.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use driphub_core::Principal;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires an authenticated principal.
///
/// Reads `Authorization: Bearer <token>` and runs it through the
/// [`IdentityResolver`](crate::services::auth::IdentityResolver). A missing or
/// non-Bearer header is rejected with `NotAuthenticated` before any network or
/// database work.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(principal): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", principal.email)
/// }
/// ```
pub struct RequireAuth(pub Principal);

/// Extract the bearer credential from request headers, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = state
            .resolver()
            .resolve(bearer_token(parts))
            .await
            .map_err(AppError::Auth)?;

        set_sentry_user(principal.local_user_id.as_ref(), principal.email.as_str());

        Ok(Self(principal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc "))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
