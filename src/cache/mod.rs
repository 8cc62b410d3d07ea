//! In-memory response caching.
//!
//! Entries carry an absolute expiry and are purged lazily when a reader
//! touches them; there is no background sweeper.

pub mod expiring;

pub use expiring::{ExpiringCache, DEFAULT_FEED_CACHE_TTL_SECS, DEFAULT_MAX_ENTRIES};
