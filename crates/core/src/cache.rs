use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

/// Key/value store with per-entry time-to-live and a size bound.
///
/// Expired entries are purged lazily when read; nothing sweeps in the
/// background. When full, `set` drops an arbitrary tenth of the entries
/// before inserting, so callers must not count on retention past the TTL.
#[derive(Debug)]
pub struct ExpiringCache<V> {
    default_ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

#[derive(Debug)]
struct CacheEntry<V> {
    expires_at: Instant,
    value: V,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self { default_ttl, max_entries: max_entries.max(1), entries: Mutex::new(HashMap::new()) }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.default_ttl_secs), config.max_entries)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Stores `value` for `ttl`, or the default TTL when `None`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.set_at(key.into(), value, ttl, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.expires_at <= now,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set_at(&self, key: String, value: V, ttl: Option<Duration>, now: Instant) {
        let mut entries = self.lock();
        if entries.len() >= self.max_entries {
            let batch = (self.max_entries / 10).max(1);
            let victims: Vec<String> = entries.keys().take(batch).cloned().collect();
            for victim in victims {
                entries.remove(&victim);
            }
        }
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        entries.insert(key, CacheEntry { expires_at, value });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cache key for a logical operation plus a normalized query.
pub fn cache_key(operation: &str, query: &str) -> String {
    format!("{operation}:{}", query.trim().to_lowercase())
}
