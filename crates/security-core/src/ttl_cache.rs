//! Process-local key -> value store with per-entry expiry (spec.md §3 "TTL Cache").
//!
//! Entries expire lazily on access; nothing needs to poll a background task for the cache
//! itself to behave correctly. A caller that wants to bound worst-case memory can call
//! [`TtlCache::sweep`] periodically (the rate limiter does this every Kth request).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry<V> {
    expires_at: Instant,
    value: V,
}

/// A concurrent-safe map where every entry carries its own expiry.
pub struct TtlCache<V> {
    inner: Arc<RwLock<HashMap<String, Entry<V>>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert `value` under `key`, expiring after `ttl`.
    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.inner.write().insert(key, Entry { expires_at, value });
    }

    /// Look up `key`. Returns `None` if absent or expired; an expired entry is removed as a
    /// side effect of the lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        // Fast path under a read lock; only escalate to a write lock when we actually need to
        // evict, matching the single-map-lookup-plus-maybe-a-write shape the rate limiter and
        // JWKS cache also use.
        {
            let map = self.inner.read();
            match map.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut map = self.inner.write();
        if let Some(entry) = map.get(key)
            && entry.expires_at <= now
        {
            map.remove(key);
        }
        None
    }

    /// Remove `key` unconditionally.
    pub fn remove(&self, key: &str) {
        self.inner.write().remove(key);
    }

    /// Remove every expired entry. Cheap to call opportunistically; not required for
    /// correctness since `get` evicts lazily.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.inner.write().retain(|_, entry| entry.expires_at > now);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
