//! Shared test fixtures: RSA/EC key pairs and a token builder.
//!
//! Keys live in `testdata/`. `jwks.json` publishes the public halves of the
//! `k1` and `k2` keys; the `rogue` key appears nowhere a verifier looks.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ISSUER: &str = "https://project.supabase.co/auth/v1";
pub const AUDIENCE: &str = "authenticated";

pub const K1_PRIVATE_PEM: &str = include_str!("../testdata/k1_private.pem");
pub const K1_PUBLIC_PEM: &str = include_str!("../testdata/k1_public.pem");
pub const K2_PRIVATE_PEM: &str = include_str!("../testdata/k2_private.pem");
pub const ROGUE_PRIVATE_PEM: &str = include_str!("../testdata/rogue_private.pem");
pub const EC_PRIVATE_PEM: &str = include_str!("../testdata/ec_private.pem");
pub const JWKS_JSON: &str = include_str!("../testdata/jwks.json");

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64
}

/// Builds signed tokens with sensible defaults: matching issuer and
/// audience, one hour of validity, no kid.
pub struct TokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
}

impl TokenBuilder {
    pub fn new(subject: &str) -> Self {
        let now = now();
        let claims = json!({
            "sub": subject,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "iat": now,
            "exp": now + 3600,
            "role": "authenticated",
        });
        let Value::Object(claims) = claims else {
            unreachable!()
        };
        Self { claims, kid: None }
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    pub fn issuer(mut self, issuer: &str) -> Self {
        self.claims.insert("iss".to_string(), json!(issuer));
        self
    }

    pub fn audience(mut self, audience: &str) -> Self {
        self.claims.insert("aud".to_string(), json!(audience));
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.claims.insert("email".to_string(), json!(email));
        self
    }

    /// Set `exp` relative to now; negative values produce expired tokens.
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.claims.insert("exp".to_string(), json!(now() + secs));
        self
    }

    pub fn not_before_in(mut self, secs: i64) -> Self {
        self.claims.insert("nbf".to_string(), json!(now() + secs));
        self
    }

    pub fn without_claim(mut self, claim: &str) -> Self {
        self.claims.remove(claim);
        self
    }

    pub fn sign_rs256(self, private_pem: &str) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("RSA private key");
        self.sign(Algorithm::RS256, &key)
    }

    pub fn sign_es256(self, private_pem: &str) -> String {
        let key = EncodingKey::from_ec_pem(private_pem.as_bytes()).expect("EC private key");
        self.sign(Algorithm::ES256, &key)
    }

    pub fn sign_hs256(self, secret: &[u8]) -> String {
        self.sign(Algorithm::HS256, &EncodingKey::from_secret(secret))
    }

    fn sign(self, algorithm: Algorithm, key: &EncodingKey) -> String {
        let mut header = Header::new(algorithm);
        header.kid = self.kid;
        encode(&header, &Value::Object(self.claims), key).expect("token encoding")
    }
}
