//! Pulling bearer tokens out of requests.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::debug;

use super::error::AuthError;
use super::validator::{Principal, Verifier};

/// Token from an `Authorization: Bearer <token>` header. The scheme is
/// matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Value of the cookie named `cookie_name`, across all Cookie headers.
pub fn cookie_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Bearer header first, then the token cookie.
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    bearer_token(headers).or_else(|| cookie_token(headers, cookie_name))
}

/// Extractor for handlers that require an authenticated caller.
///
/// Rejects with [`AuthError`], which always renders as a bare 401.
///
/// ```ignore
/// async fn me(Authenticated(principal): Authenticated) -> Json<Principal> {
///     Json(principal)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    Arc<Verifier>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<Verifier>::from_ref(state);

        let token = extract_token(&parts.headers, verifier.token_cookie()).ok_or_else(|| {
            debug!(path = %parts.uri.path(), "No bearer token presented");
            AuthError::MissingToken
        })?;

        match verifier.verify(token).await {
            Ok(principal) => Ok(Authenticated(principal)),
            Err(e) => {
                debug!(
                    path = %parts.uri.path(),
                    failure = ?e.failure(),
                    error = %e,
                    "Authentication failed"
                );
                Err(e)
            }
        }
    }
}
