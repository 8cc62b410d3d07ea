//! Movie API gateway.
//!
//! Serves the public feed and movie routes and the authenticated `/v1/me`
//! route, verifying bearer tokens issued by the identity provider.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

use moodle_auth_gateway::http::{router, AppState, FeedConfig};
use moodle_auth_gateway::upstream::{MovieClient, UpstreamConfig};
use moodle_auth_gateway::verifier::{Verifier, VerifierConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "moodle-auth-gateway")]
#[command(about = "Token-verifying, caching gateway for the movie API")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
    listen: SocketAddr,

    /// RSA public key (PEM) or JWKS document used for every token
    #[arg(long, env = "SUPABASE_JWT_PUBLIC_KEY")]
    jwt_public_key: Option<String>,

    /// File holding the RSA public key or JWKS document
    #[arg(long, env = "SUPABASE_JWT_PUBLIC_KEY_FILE", conflicts_with = "jwt_public_key")]
    jwt_public_key_file: Option<PathBuf>,

    /// JWKS endpoint used when no static key is configured
    #[arg(long, env = "SUPABASE_JWKS_URL")]
    jwks_url: Option<String>,

    /// Expected audience
    #[arg(long, default_value = "authenticated", env = "SUPABASE_JWT_AUDIENCE")]
    jwt_audience: String,

    /// Expected issuer
    #[arg(long, env = "SUPABASE_JWT_ISSUER")]
    jwt_issuer: String,

    /// Cookie consulted when there is no bearer header
    #[arg(long, default_value = "access_token", env = "TOKEN_COOKIE")]
    token_cookie: String,

    /// Seconds a fetched signing key stays trusted (unset: until restart)
    #[arg(long, env = "JWKS_KEY_TTL_SECS")]
    jwks_key_ttl_secs: Option<u64>,

    /// Allowed clock skew for exp/nbf in seconds
    #[arg(long, default_value_t = 0, env = "CLOCK_SKEW_SECS")]
    clock_skew_secs: u64,

    /// Timeout for outbound HTTP calls in seconds
    #[arg(long, default_value_t = 10, env = "HTTP_TIMEOUT_SECS")]
    http_timeout_secs: u64,

    /// Movie API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: String,

    /// Movie API base URL
    #[arg(long, default_value = "https://api.themoviedb.org/3", env = "TMDB_BASE_URL")]
    tmdb_base_url: String,

    /// Lifetime of cached feed responses in seconds
    #[arg(long, default_value_t = 60, env = "FEED_CACHE_TTL_SECS")]
    feed_cache_ttl_secs: u64,

    /// Maximum cached feed responses (0 for unbounded)
    #[arg(long, default_value_t = 10_000, env = "FEED_CACHE_MAX_ENTRIES")]
    feed_cache_max_entries: usize,

    /// Enable verbose logging
    #[arg(short, long, env = "GATEWAY_VERBOSE")]
    verbose: bool,
}

/// Validated runtime configuration.
#[derive(Debug)]
struct GatewayConfig {
    listen: SocketAddr,
    verifier: VerifierConfig,
    upstream: UpstreamConfig,
    feed: FeedConfig,
}

impl GatewayConfig {
    fn from_args(args: &Args) -> Result<Self> {
        let static_key_material = match &args.jwt_public_key_file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read JWT public key: {:?}", path))?,
            ),
            None => args.jwt_public_key.clone(),
        };

        let verifier = VerifierConfig {
            static_key_material,
            jwks_url: args.jwks_url.clone().filter(|url| !url.is_empty()),
            audience: args.jwt_audience.clone(),
            issuer: args.jwt_issuer.clone(),
            token_cookie: args.token_cookie.clone(),
            http_timeout_secs: args.http_timeout_secs,
            jwks_key_ttl_secs: args.jwks_key_ttl_secs,
            clock_skew_secs: args.clock_skew_secs,
        };
        verifier.validate().map_err(|e| anyhow!(e))?;

        let upstream = UpstreamConfig {
            api_key: args.tmdb_api_key.clone(),
            base_url: args.tmdb_base_url.clone(),
            timeout_secs: args.http_timeout_secs,
        };
        upstream.validate().map_err(|e| anyhow!(e))?;

        let feed = FeedConfig {
            cache_ttl_secs: args.feed_cache_ttl_secs,
            max_entries: args.feed_cache_max_entries,
        };
        feed.validate().map_err(|e| anyhow!(e))?;

        Ok(Self {
            listen: args.listen,
            verifier,
            upstream,
            feed,
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={},tower_http=info", env!("CARGO_CRATE_NAME"), log_level))
        .json()
        .init();

    info!("Starting movie API gateway");

    let config = GatewayConfig::from_args(&args)?;

    info!(
        static_key = config.verifier.static_key_material.is_some(),
        jwks_url = ?config.verifier.jwks_url,
        audience = %config.verifier.audience,
        issuer = %config.verifier.issuer,
        feed_cache_ttl_secs = config.feed.cache_ttl_secs,
        feed_cache_max_entries = config.feed.max_entries,
        "Configuration loaded"
    );

    let verifier = Verifier::new(&config.verifier)?;
    info!(key_source = verifier.resolver().mode(), "Verifier ready");
    let movies = MovieClient::new(&config.upstream)?;
    let app = router(AppState::new(verifier, movies, &config.feed));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(addr = %config.listen, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec![
            "moodle-auth-gateway",
            "--jwt-issuer",
            "https://project.supabase.co/auth/v1",
            "--tmdb-api-key",
            "secret",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        let config = GatewayConfig::from_args(&args).unwrap();

        assert_eq!(config.listen, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.verifier.audience, "authenticated");
        assert_eq!(config.verifier.token_cookie, "access_token");
        assert_eq!(config.verifier.http_timeout_secs, 10);
        assert_eq!(config.verifier.jwks_key_ttl_secs, None);
        assert_eq!(config.upstream.base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.feed.cache_ttl_secs, 60);
        assert_eq!(config.feed.max_entries, 10_000);
    }

    #[test]
    fn test_issuer_and_api_key_required() {
        assert!(Args::try_parse_from(["moodle-auth-gateway", "--tmdb-api-key", "k"]).is_err());
        assert!(Args::try_parse_from([
            "moodle-auth-gateway",
            "--jwt-issuer",
            "https://issuer"
        ])
        .is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let args = parse(&["--jwks-url", "not-a-url"]).unwrap();
        assert!(GatewayConfig::from_args(&args).is_err());

        let args = parse(&["--feed-cache-ttl-secs", "0"]).unwrap();
        assert!(GatewayConfig::from_args(&args).is_err());

        let args = parse(&["--feed-cache-ttl-secs", "18446744073709551615"]).unwrap();
        assert!(GatewayConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_key_file_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN PUBLIC KEY-----").unwrap();

        let args = parse(&["--jwt-public-key-file", file.path().to_str().unwrap()]).unwrap();
        let config = GatewayConfig::from_args(&args).unwrap();
        assert!(config
            .verifier
            .static_key_material
            .as_deref()
            .is_some_and(|m| m.starts_with("-----BEGIN PUBLIC KEY-----")));

        let args = parse(&["--jwt-public-key-file", "/nonexistent/key.pem"]).unwrap();
        assert!(GatewayConfig::from_args(&args).is_err());
    }
}
