//! Key-set (JWKS) documents: fetching and decoding RSA entries.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::KeyError;

/// Key-set document served by the issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type. Only "RSA" is accepted.
    pub kty: String,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url, unpadded, big-endian)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent (base64url, unpadded, big-endian)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwks {
    /// Parse a key-set document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        serde_json::from_slice(bytes).map_err(|e| KeyError::MalformedKeySet(e.to_string()))
    }

    /// Entry whose kid equals `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}

/// Fetch the whole key set from `url`.
///
/// Transport errors, non-200 answers and undecodable bodies are all fetch
/// failures. The client's timeout bounds the call.
pub async fn fetch_jwks(http_client: &reqwest::Client, url: &str) -> Result<Jwks, KeyError> {
    debug!(url = %url, "Fetching JWKS");

    let response = http_client.get(url).send().await.map_err(KeyError::Fetch)?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(KeyError::Status(status));
    }

    let body = response.bytes().await.map_err(KeyError::Fetch)?;
    let jwks = Jwks::from_slice(&body)?;

    debug!(url = %url, key_count = jwks.keys.len(), "Fetched JWKS");
    Ok(jwks)
}

/// Convert an RSA JWK into a key usable for signature checks.
pub fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, KeyError> {
    if jwk.kty != "RSA" {
        return Err(KeyError::UnsupportedKeyType(jwk.kty.clone()));
    }

    if jwk.key_use.as_deref() == Some("enc") {
        return Err(KeyError::InvalidKey("key is marked for encryption".to_string()));
    }

    let n = jwk
        .n
        .as_deref()
        .ok_or_else(|| KeyError::InvalidKey("RSA key missing 'n'".to_string()))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or_else(|| KeyError::InvalidKey("RSA key missing 'e'".to_string()))?;

    decode_component("n", n)?;
    decode_component("e", e)?;

    DecodingKey::from_rsa_components(n, e).map_err(|err| KeyError::InvalidKey(err.to_string()))
}

/// Parse statically configured key material.
///
/// A value starting with `{` is treated as a key-set document and its first
/// entry is used; anything else must be a PEM RSA public key.
pub fn parse_static_key_material(material: &str) -> Result<DecodingKey, KeyError> {
    let material = material.trim();
    if material.is_empty() {
        return Err(KeyError::NoVerificationKey);
    }

    if material.starts_with('{') {
        let jwks = Jwks::from_slice(material.as_bytes())?;
        let first = jwks
            .keys
            .first()
            .ok_or_else(|| KeyError::MalformedKeySet("key set is empty".to_string()))?;
        return jwk_to_decoding_key(first);
    }

    DecodingKey::from_rsa_pem(material.as_bytes())
        .map_err(|err| KeyError::InvalidKey(err.to_string()))
}

/// Check that a big-endian integer component is valid, non-empty base64url.
fn decode_component(name: &str, value: &str) -> Result<Vec<u8>, KeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|err| KeyError::InvalidKey(format!("RSA '{name}' is not base64url: {err}")))?;
    if bytes.iter().all(|b| *b == 0) {
        return Err(KeyError::InvalidKey(format!("RSA '{name}' is zero")));
    }
    Ok(bytes)
}
