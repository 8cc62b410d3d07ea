//! Verification key resolution.
//!
//! The key source is picked once, when the verifier is built:
//!
//! ```text
//! static material parses  → Static   (one key, no network, kid ignored)
//! else jwks_url present   → Rotating (kid → cache → fetch key set → cache)
//! else                    → Unconfigured (every token fails)
//! ```

use anyhow::{Context, Result};
use jsonwebtoken::DecodingKey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::VerifierConfig;
use super::error::KeyError;
use super::jwks::{fetch_jwks, jwk_to_decoding_key, parse_static_key_material};
use super::keys::ResolvedKeyCache;
use crate::clock::{Clock, SystemClock};

/// Where verification keys come from.
pub enum KeyResolver {
    /// A single configured key used for every token.
    Static(DecodingKey),
    /// Keys fetched from a key-set endpoint and cached per kid.
    Rotating(RotatingKeySet),
    /// No usable key source.
    Unconfigured,
}

impl KeyResolver {
    /// Choose the key source described by `config`.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`KeyResolver::from_config`], with the clock driving resolved-key
    /// expiry.
    pub fn from_config_with_clock(config: &VerifierConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(material) = config.static_key_material.as_deref() {
            if !material.trim().is_empty() {
                match parse_static_key_material(material) {
                    Ok(key) => {
                        info!("Using static verification key");
                        return Ok(KeyResolver::Static(key));
                    }
                    Err(e) => {
                        warn!(error = %e, "Static key material did not parse, falling back");
                    }
                }
            }
        }

        if let Some(ref url) = config.jwks_url {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .context("Failed to create HTTP client")?;
            let cache = ResolvedKeyCache::with_clock(
                config.jwks_key_ttl_secs.map(Duration::from_secs),
                clock,
            );

            info!(url = %url, key_ttl_secs = ?config.jwks_key_ttl_secs, "Using rotating key set");
            return Ok(KeyResolver::Rotating(RotatingKeySet::new(
                url.clone(),
                http_client,
                cache,
            )));
        }

        warn!("No verification key source configured, all tokens will be rejected");
        Ok(KeyResolver::Unconfigured)
    }

    /// Key to check a token signed under `kid` with.
    pub async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyError> {
        match self {
            KeyResolver::Static(key) => Ok(key.clone()),
            KeyResolver::Rotating(keys) => {
                let kid = kid.filter(|k| !k.is_empty()).ok_or(KeyError::MissingKid)?;
                keys.key_for(kid).await
            }
            KeyResolver::Unconfigured => Err(KeyError::NoVerificationKey),
        }
    }

    /// Short name of the active source, for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            KeyResolver::Static(_) => "static",
            KeyResolver::Rotating(_) => "rotating",
            KeyResolver::Unconfigured => "unconfigured",
        }
    }
}

/// Remote key set with a per-kid cache of decoded keys.
pub struct RotatingKeySet {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: ResolvedKeyCache,
}

impl RotatingKeySet {
    pub fn new(jwks_url: String, http_client: reqwest::Client, cache: ResolvedKeyCache) -> Self {
        Self {
            jwks_url,
            http_client,
            cache,
        }
    }

    /// Cached key for `kid`, fetching the key set on a miss.
    ///
    /// Only the matching entry is cached. Concurrent misses on the same kid
    /// each fetch; the last insert wins and all of them are equivalent.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, KeyError> {
        if let Some(key) = self.cache.get(kid) {
            return Ok(key);
        }

        debug!(kid = %kid, "Key not found in cache, fetching JWKS");
        let jwks = fetch_jwks(&self.http_client, &self.jwks_url).await?;

        let jwk = jwks
            .find(kid)
            .ok_or_else(|| KeyError::KidNotFound(kid.to_string()))?;
        let key = jwk_to_decoding_key(jwk)?;

        self.cache.insert(kid.to_string(), key.clone());
        info!(kid = %kid, cached_keys = self.cache.len(), "Resolved signing key");

        Ok(key)
    }

    /// Number of kids resolved so far.
    pub fn cached_keys(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testutil;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rotating_config(server: &MockServer) -> VerifierConfig {
        VerifierConfig {
            jwks_url: Some(format!("{}/jwks.json", server.uri())),
            issuer: testutil::ISSUER.to_string(),
            ..Default::default()
        }
    }

    async fn serve_jwks(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(testutil::JWKS_JSON, "application/json"),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_static_key_wins_over_jwks_url() {
        let config = VerifierConfig {
            static_key_material: Some(testutil::K1_PUBLIC_PEM.to_string()),
            jwks_url: Some("https://issuer.example.com/jwks.json".to_string()),
            issuer: testutil::ISSUER.to_string(),
            ..Default::default()
        };
        let resolver = KeyResolver::from_config(&config).unwrap();
        assert_eq!(resolver.mode(), "static");
    }

    #[test]
    fn test_unparseable_static_key_falls_back_to_jwks() {
        let config = VerifierConfig {
            static_key_material: Some("not a key".to_string()),
            jwks_url: Some("https://issuer.example.com/jwks.json".to_string()),
            issuer: testutil::ISSUER.to_string(),
            ..Default::default()
        };
        let resolver = KeyResolver::from_config(&config).unwrap();
        assert_eq!(resolver.mode(), "rotating");
    }

    #[tokio::test]
    async fn test_unconfigured_has_no_key() {
        let config = VerifierConfig {
            static_key_material: Some("not a key".to_string()),
            issuer: testutil::ISSUER.to_string(),
            ..Default::default()
        };
        let resolver = KeyResolver::from_config(&config).unwrap();
        assert_eq!(resolver.mode(), "unconfigured");
        assert!(matches!(
            resolver.resolve(Some("k1")).await,
            Err(KeyError::NoVerificationKey)
        ));
    }

    #[tokio::test]
    async fn test_static_key_ignores_kid() {
        let config = VerifierConfig {
            static_key_material: Some(testutil::K1_PUBLIC_PEM.to_string()),
            issuer: testutil::ISSUER.to_string(),
            ..Default::default()
        };
        let resolver = KeyResolver::from_config(&config).unwrap();
        assert!(resolver.resolve(None).await.is_ok());
        assert!(resolver.resolve(Some("anything")).await.is_ok());
    }

    #[tokio::test]
    async fn test_kid_cached_after_first_fetch() {
        let server = MockServer::start().await;
        serve_jwks(&server, 1).await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        assert!(resolver.resolve(Some("k1")).await.is_ok());
        assert!(resolver.resolve(Some("k1")).await.is_ok());
        assert!(resolver.resolve(Some("k1")).await.is_ok());

        let KeyResolver::Rotating(keys) = &resolver else {
            panic!("expected rotating resolver");
        };
        assert_eq!(keys.cached_keys(), 1);
    }

    #[tokio::test]
    async fn test_sibling_kid_is_not_precached() {
        let server = MockServer::start().await;
        serve_jwks(&server, 2).await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        assert!(resolver.resolve(Some("k1")).await.is_ok());
        assert!(resolver.resolve(Some("k2")).await.is_ok());
        assert!(resolver.resolve(Some("k2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kid_fails_and_is_retried() {
        let server = MockServer::start().await;
        serve_jwks(&server, 2).await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        for _ in 0..2 {
            assert!(matches!(
                resolver.resolve(Some("k9")).await,
                Err(KeyError::KidNotFound(kid)) if kid == "k9"
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_kid_never_fetches() {
        let server = MockServer::start().await;
        serve_jwks(&server, 0).await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        assert!(matches!(resolver.resolve(None).await, Err(KeyError::MissingKid)));
        assert!(matches!(resolver.resolve(Some("")).await, Err(KeyError::MissingKid)));
    }

    #[tokio::test]
    async fn test_non_200_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        assert!(matches!(
            resolver.resolve(Some("k1")).await,
            Err(KeyError::Status(status)) if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn test_malformed_jwks_is_key_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"keys\": [oops"))
            .mount(&server)
            .await;

        let resolver = KeyResolver::from_config(&rotating_config(&server)).unwrap();
        assert!(matches!(
            resolver.resolve(Some("k1")).await,
            Err(KeyError::MalformedKeySet(_))
        ));
    }

    #[tokio::test]
    async fn test_resolved_key_ttl_forces_refetch() {
        let server = MockServer::start().await;
        serve_jwks(&server, 2).await;

        let clock = Arc::new(ManualClock::new());
        let config = VerifierConfig {
            jwks_key_ttl_secs: Some(300),
            ..rotating_config(&server)
        };
        let resolver = KeyResolver::from_config_with_clock(&config, clock.clone()).unwrap();

        assert!(resolver.resolve(Some("k1")).await.is_ok());
        clock.advance(Duration::from_secs(299));
        assert!(resolver.resolve(Some("k1")).await.is_ok());
        clock.advance(Duration::from_secs(2));
        assert!(resolver.resolve(Some("k1")).await.is_ok());
    }
}
