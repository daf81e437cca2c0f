//! Result cache - TTL-bounded memoization of expensive query results.
//!
//! The cache is an explicit component: callers derive a [`CacheKey`] from
//! every argument that shapes the result, pick a TTL per call, and hand over
//! the producer to run on a miss. Expired entries are swept on every call.
//!
//! The cache is not coherent with writes. A document updated through the
//! update engine stays stale in cached results until their TTL runs out.
//!
//! ## Example
//!
//! ```ignore
//! let cache = ResultCache::new();
//! let key = CacheKey::derive(&(&query, &collections))?;
//! let result = cache
//!     .get_or_try_insert_with(key, Duration::from_secs(30), || search.search(&query, &collections))
//!     .await?;
//! ```

mod cached_search;
mod key;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub use cached_search::CachedFederatedSearch;
pub use key::CacheKey;

struct Entry<V> {
    value: V,
    stored_at: Instant,
    // None when the TTL is too large to represent.
    expires_at: Option<Instant>,
}

/// Counters describing cache effectiveness since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// TTL-bounded memoization table.
///
/// The table mutex is never held while a producer runs, so concurrent misses
/// on the same key may each invoke their producer; the last one to finish
/// wins the slot.
pub struct ResultCache<V> {
    entries: Mutex<HashMap<CacheKey, Entry<V>>>,
    max_entries: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResultCache<V> {
    /// Create an unbounded cache (bounded only by TTL sweeping).
    pub fn new() -> Self {
        ResultCache {
            entries: Mutex::new(HashMap::new()),
            max_entries: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cap the number of live entries; the oldest entries go first.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.table().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.table().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut table = self.table();
        self.sweep_locked(&mut table, Instant::now())
    }

    fn sweep_locked(&self, table: &mut HashMap<CacheKey, Entry<V>>, now: Instant) -> usize {
        let before = table.len();
        table.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        let removed = before - table.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    // Poisoning is ignored: entries are only ever replaced whole.
    fn table(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> ResultCache<V> {
    /// Return the value stored under `key` if it is younger than `ttl`.
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<V> {
        let now = Instant::now();
        let mut table = self.table();
        self.sweep_locked(&mut table, now);
        table
            .get(key)
            .filter(|entry| now.duration_since(entry.stored_at) < ttl)
            .map(|entry| entry.value.clone())
    }

    /// Store `value` under `key` with a fresh timestamp.
    pub fn insert(&self, key: CacheKey, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut table = self.table();
        self.sweep_locked(&mut table, now);

        if let Some(max) = self.max_entries {
            while table.len() >= max && !table.contains_key(&key) {
                let oldest = table
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        table.remove(&oldest);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                    None => break,
                }
            }
        }

        table.insert(
            key,
            Entry {
                value,
                stored_at: now,
                expires_at: now.checked_add(ttl),
            },
        );
    }

    /// Return the cached value, or run `producer` and cache its success.
    ///
    /// Producer errors are returned as-is and never cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_try_insert_if(key, ttl, producer, |_| true).await
    }

    /// Like [`get_or_try_insert_with`](Self::get_or_try_insert_with), but only
    /// caches values accepted by `cacheable`.
    pub async fn get_or_try_insert_if<F, Fut, E, P>(
        &self,
        key: CacheKey,
        ttl: Duration,
        producer: F,
        cacheable: P,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        if let Some(value) = self.get(&key, ttl) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "result cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "result cache miss");

        let value = producer().await?;
        if cacheable(&value) {
            self.insert(key, value.clone(), ttl);
        }
        Ok(value)
    }
}
