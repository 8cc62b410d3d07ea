//! Token verifier configuration.

use serde::{Deserialize, Serialize};

/// Bearer token verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// PEM-encoded RSA public key, or a JSON key-set document whose first
    /// key is used. When it parses, it is the only key ever used.
    #[serde(default)]
    pub static_key_material: Option<String>,

    /// Key-set endpoint consulted when no static key is usable.
    /// Example: "https://project.supabase.co/auth/v1/.well-known/jwks.json"
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Expected audience (aud claim). Must match exactly.
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Expected issuer (iss claim). Must match exactly.
    #[serde(default)]
    pub issuer: String,

    /// Cookie read when the request has no bearer Authorization header.
    #[serde(default = "default_token_cookie")]
    pub token_cookie: String,

    /// Timeout for key-set fetches in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// How long a resolved key stays trusted. `None` keeps keys until
    /// restart.
    #[serde(default)]
    pub jwks_key_ttl_secs: Option<u64>,

    /// Clock skew tolerance in seconds for exp/nbf validation.
    #[serde(default)]
    pub clock_skew_secs: u64,
}

fn default_audience() -> String {
    "authenticated".to_string()
}

fn default_token_cookie() -> String {
    "access_token".to_string()
}

pub(crate) fn default_http_timeout() -> u64 {
    10
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            static_key_material: None,
            jwks_url: None,
            audience: default_audience(),
            issuer: String::new(),
            token_cookie: default_token_cookie(),
            http_timeout_secs: default_http_timeout(),
            jwks_key_ttl_secs: None,
            clock_skew_secs: 0,
        }
    }
}

impl VerifierConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.is_empty() {
            return Err("JWT issuer is required".to_string());
        }

        if self.audience.is_empty() {
            return Err("JWT audience is required".to_string());
        }

        if self.token_cookie.is_empty() {
            return Err("Token cookie name must not be empty".to_string());
        }

        if self.http_timeout_secs == 0 {
            return Err("HTTP timeout must be at least one second".to_string());
        }

        if let Some(ref url) = self.jwks_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err("JWKS URL must be a valid HTTP(S) URL".to_string());
            }
        }

        Ok(())
    }

    /// Whether any key source is configured at all.
    pub fn has_key_source(&self) -> bool {
        let has_static = self
            .static_key_material
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        has_static || self.jwks_url.is_some()
    }
}
