//! Bearer token verification and response caching in front of a movie
//! metadata API.
//!
//! - [`verifier`]: RS256/384/512 token checks against a static key or a
//!   rotating key set, exposed to handlers through the
//!   [`verifier::Authenticated`] extractor.
//! - [`cache`]: a TTL cache used for feed responses.
//! - [`upstream`]: the movie API client.
//! - [`http`]: the axum router tying them together.

pub mod cache;
pub mod clock;
pub mod http;
pub mod upstream;
pub mod verifier;

#[cfg(test)]
mod testutil;
