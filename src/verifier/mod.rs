//! Bearer token verification with static or rotating RSA keys.
//!
//! Tokens are accepted only when RSA-signed, unexpired, and scoped to the
//! configured audience and issuer. Keys come either from a static PEM/JWKS
//! value or from a key-set endpoint whose entries are cached per kid.

pub mod config;
pub mod error;
pub mod extract;
pub mod jwks;
pub mod keys;
pub mod resolver;
pub mod validator;

pub use config::VerifierConfig;
pub use error::{AuthError, AuthFailure, KeyError};
pub use extract::{extract_token, Authenticated};
pub use resolver::KeyResolver;
pub use validator::{Principal, Verifier, ALLOWED_ALGORITHMS};
