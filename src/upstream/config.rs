//! Movie API client configuration.

use serde::{Deserialize, Serialize};

use crate::verifier::config::default_http_timeout;

/// Settings for the upstream movie-metadata API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// API key sent as the `api_key` query parameter.
    #[serde(default)]
    pub api_key: String,

    /// Base URL, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl UpstreamConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("Movie API key is required".to_string());
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err("Movie API base URL must be a valid HTTP(S) URL".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("HTTP timeout must be at least one second".to_string());
        }

        Ok(())
    }
}
