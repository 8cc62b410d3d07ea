//! Generic key/value cache with a fixed per-instance TTL.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

/// Default TTL for cached feed responses in seconds.
pub const DEFAULT_FEED_CACHE_TTL_SECS: u64 = 60;

/// Default upper bound on live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Longest TTL a cache accepts; larger values are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cache whose entries expire a fixed duration after they were written.
///
/// Readers never observe an entry past its expiry instant. Expired entries
/// are removed by the `get` call that finds them, and, when the cache is
/// bounded, by `set` when it needs room.
pub struct ExpiringCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an unbounded cache using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create an unbounded cache driven by the given clock. The TTL is
    /// clamped to [`MAX_TTL`].
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: ttl.min(MAX_TTL),
            max_entries: None,
            clock,
        }
    }

    /// Bound the number of stored entries. A bound of zero leaves the cache
    /// unbounded.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = (max_entries > 0).then_some(max_entries);
        self
    }

    /// TTL applied to every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live value.
    ///
    /// Finding an expired entry removes it and reports a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();

        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.write();
        // A writer may have refreshed the entry between the two locks.
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            debug!("Evicted expired cache entry");
        }
        None
    }

    /// Store a value, replacing whatever was there.
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now();
        let Some(expires_at) = now.checked_add(self.ttl) else {
            warn!(
                ttl_secs = self.ttl.as_secs(),
                "Cache TTL overflows the clock, value not stored"
            );
            return;
        };

        let mut entries = self.write();
        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                Self::make_room(&mut entries, now, max);
            }
        }
        entries.insert(key, Entry { value, expires_at });
    }

    /// Remove an entry if present.
    pub fn delete(&self, key: &K) {
        self.write().remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, then the soonest-expiring ones until there is
    /// space for one more.
    fn make_room(entries: &mut HashMap<K, Entry<V>>, now: Instant, max: usize) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));

        while entries.len() >= max {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }

        debug!(
            evicted = before - entries.len(),
            max_entries = max,
            "Cache full, evicted entries"
        );
    }

    // Critical sections never leave the map half-written, so a poisoned
    // lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
