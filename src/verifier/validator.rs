//! Bearer token validation.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::VerifierConfig;
use super::error::AuthError;
use super::resolver::KeyResolver;

/// Signing algorithms accepted from token headers.
///
/// Anything else, HMAC in particular, is rejected before a key is resolved.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Claims read from a verified token.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

/// Identity established by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Subject (user identifier) from the `sub` claim.
    #[serde(rename = "id")]
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Verifies RSA-signed bearer tokens against a fixed audience and issuer.
pub struct Verifier {
    audience: String,
    issuer: String,
    leeway_secs: u64,
    token_cookie: String,
    resolver: KeyResolver,
}

impl Verifier {
    /// Build a verifier, choosing its key source from `config`.
    pub fn new(config: &VerifierConfig) -> anyhow::Result<Self> {
        let resolver = KeyResolver::from_config(config)?;
        Ok(Self::with_resolver(config, resolver))
    }

    pub fn with_resolver(config: &VerifierConfig, resolver: KeyResolver) -> Self {
        Self {
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            leeway_secs: config.clock_skew_secs,
            token_cookie: config.token_cookie.clone(),
            resolver,
        }
    }

    /// Cookie holding the raw token for browser requests.
    pub fn token_cookie(&self) -> &str {
        &self.token_cookie
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Verify `token` and return the principal it names.
    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token)?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::DisallowedAlgorithm(header.alg));
        }

        debug!(kid = ?header.kid, alg = ?header.alg, "Validating bearer token");

        let decoding_key = self.resolver.resolve(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation)?;
        let claims = token_data.claims;

        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::MissingClaim("sub".to_string()))?;

        debug!(subject = %subject, "Bearer token validated");

        Ok(Principal {
            subject,
            email: claims.email,
            role: claims.role,
        })
    }
}
