//! Authentication error types.
//!
//! Every variant is reported to clients as the same `401 Unauthorized`
//! response. The variants exist for logs and tests only.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Reasons a request failed to authenticate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token in the Authorization header or the token cookie.
    #[error("No bearer token in request")]
    MissingToken,

    /// Token is not a decodable JWT.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Header names an algorithm outside the RSA family.
    #[error("Disallowed signing algorithm: {0:?}")]
    DisallowedAlgorithm(Algorithm),

    /// Signature does not match the resolved key.
    #[error("Invalid signature")]
    InvalidSignature,

    /// `exp` has passed.
    #[error("Token expired")]
    TokenExpired,

    /// `nbf` is in the future.
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// `aud` does not contain the configured audience.
    #[error("Invalid audience")]
    InvalidAudience,

    /// `iss` differs from the configured issuer.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// A required claim is absent or empty.
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// No key could be found to check the signature with.
    #[error("Key resolution failed: {0}")]
    KeyResolution(#[from] KeyError),
}

/// Failures while turning configuration or a key set into a decoding key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Neither a static key nor a key-set URL is usable.
    #[error("No verification key")]
    NoVerificationKey,

    /// Rotating keys are configured but the token header carries no kid.
    #[error("Token header has no kid")]
    MissingKid,

    /// Transport failure talking to the key-set endpoint.
    #[error("Key set fetch failed: {0}")]
    Fetch(#[source] reqwest::Error),

    /// Key-set endpoint answered with a non-200 status.
    #[error("Key set endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    /// Key-set body is not a valid key-set document.
    #[error("Malformed key set: {0}")]
    MalformedKeySet(String),

    /// Key set holds no entry for the requested kid.
    #[error("Key with kid '{0}' not found in key set")]
    KidNotFound(String),

    /// Entry is not an RSA key.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Entry or PEM could not be decoded into an RSA public key.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// Coarse classification of an [`AuthError`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Token missing, empty or structurally broken.
    MalformedCredential,
    /// Wrong key, disallowed algorithm or signature mismatch.
    UntrustedSignature,
    /// Expired, not yet valid, wrong audience or issuer, no subject.
    OutOfScope,
    /// Key-set fetch, kid lookup or key decoding failed.
    KeyResolution,
}

impl AuthError {
    pub fn failure(&self) -> AuthFailure {
        match self {
            AuthError::MissingToken | AuthError::MalformedToken(_) => {
                AuthFailure::MalformedCredential
            }
            AuthError::DisallowedAlgorithm(_) | AuthError::InvalidSignature => {
                AuthFailure::UntrustedSignature
            }
            AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::InvalidAudience
            | AuthError::InvalidIssuer
            | AuthError::MissingClaim(_) => AuthFailure::OutOfScope,
            AuthError::KeyResolution(_) => AuthFailure::KeyResolution,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => AuthError::InvalidSignature,
            _ => AuthError::MalformedToken(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            "Unauthorized",
        )
            .into_response()
    }
}
