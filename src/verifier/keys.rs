//! Cache of decoded public keys indexed by kid.

use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

struct ResolvedKey {
    key: DecodingKey,
    resolved_at: Instant,
}

/// Keys resolved from the key-set endpoint.
///
/// Populated one kid at a time by whichever fetch resolved it. Without a TTL
/// entries live until the process exits, so a rotated-out key stays trusted
/// until restart.
pub struct ResolvedKeyCache {
    keys: RwLock<HashMap<String, ResolvedKey>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl ResolvedKeyCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Cached key for `kid`, unless it has outlived the TTL.
    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let now = self.clock.now();

        {
            let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
            let resolved = keys.get(kid)?;
            if !self.is_stale(resolved, now) {
                return Some(resolved.key.clone());
            }
        }

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.get(kid).is_some_and(|resolved| self.is_stale(resolved, now)) {
            keys.remove(kid);
            debug!(kid = %kid, "Dropped stale resolved key");
        }
        None
    }

    /// Remember the key resolved for `kid`, replacing any previous one.
    pub fn insert(&self, kid: String, key: DecodingKey) {
        let resolved = ResolvedKey {
            key,
            resolved_at: self.clock.now(),
        };
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kid, resolved);
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn is_stale(&self, resolved: &ResolvedKey, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(resolved.resolved_at) > ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testutil;

    fn test_key() -> DecodingKey {
        DecodingKey::from_rsa_pem(testutil::K1_PUBLIC_PEM.as_bytes()).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ResolvedKeyCache::new(None);
        assert!(cache.get("k1").is_none());

        cache.insert("k1".to_string(), test_key());
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k2").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_without_ttl_keys_never_expire() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResolvedKeyCache::with_clock(None, clock.clone());
        cache.insert("k1".to_string(), test_key());

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(cache.get("k1").is_some());
    }

    #[test]
    fn test_ttl_drops_rotated_keys() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResolvedKeyCache::with_clock(Some(Duration::from_secs(600)), clock.clone());
        cache.insert("k1".to_string(), test_key());

        clock.advance(Duration::from_secs(600));
        assert!(cache.get("k1").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.len(), 0);
    }
}
