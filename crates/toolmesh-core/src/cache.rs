//! In-memory TTL cache
//!
//! Entries are readable only while `now < created_at + ttl`. Expired entries
//! are logically absent immediately and physically evicted lazily on read or
//! by [`TtlCache::sweep_expired`].

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    // a ttl past the clock's range never expires
    fn is_live(&self, now: Instant) -> bool {
        self.created_at
            .checked_add(self.ttl)
            .map_or(true, |expires_at| now < expires_at)
    }
}

/// Key → value store with per-entry TTL
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value for `key`, evicting it if expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Return the live value for `key`, or compute, store and return it.
    ///
    /// Concurrent misses on the same key wait for the first computation
    /// instead of recomputing. Failures are returned and never stored.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        let guard = InFlight::acquire(&self.in_flight, key);
        let _compute_lock = guard.lock().await;

        if let Some(value) = self.get(key) {
            debug!(key = %key, "Cache filled while waiting");
            return Ok(value);
        }

        debug!(key = %key, "Cache miss, computing");
        let value = compute().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove `key`, returning whether a live entry existed
    pub fn invalidate(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now))
    }

    /// Number of stored entries, including expired ones not yet evicted
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            debug!(removed = removed, "Swept expired cache entries");
        }
        removed
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Sweep expired entries every `interval` until the cache is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep_expired();
                    }
                    None => break,
                }
            }
        })
    }
}

/// Per-key compute lock, removed from the map once nobody else holds it
struct InFlight<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn acquire(map: &'a DashMap<String, Arc<Mutex<()>>>, key: &'a str) -> Self {
        let lock = Arc::clone(
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        Self { map, key, lock }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // the map and this guard are the only holders
        self.map
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Build a deterministic cache key from a namespace and named parameters.
///
/// Parameters are sorted by name before hashing, so the order the caller
/// supplies them in never changes the key.
pub fn build_key<'a, I, K>(namespace: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, &'a Value)>,
    K: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_string(), value.to_string()))
        .collect();
    pairs.sort();

    let mut canonical = String::new();
    for (name, value) in &pairs {
        canonical.push_str(&Value::String(name.clone()).to_string());
        canonical.push(':');
        canonical.push_str(value);
        canonical.push(',');
    }

    format!("{}:{:x}", namespace, Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests;
