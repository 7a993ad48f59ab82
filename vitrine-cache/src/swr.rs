//! Stale-while-revalidate cache over injected async queries.
//!
//! This module implements the core caching logic: fresh hits are served
//! directly, stale hits are served immediately while at most one background
//! refresh per key runs behind them, and misses fetch synchronously with
//! concurrent first readers coalescing behind a single fetch.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use vitrine_core::{DataSourceError, VitrineResult};

use crate::config::CacheConfig;
use crate::connector::{Connector, NoopConnector};
use crate::entry::{CacheEntry, StoredEntry};
use crate::read::CachedValue;
use crate::stats::{CacheStats, Counters};

/// Per-key synchronization state.
///
/// `fetch_lock` serializes every query invocation for the key, miss-path
/// fetches and background refreshes alike. `refreshing` is the in-flight
/// refresh claim, taken by compare-and-swap before a refresh task is spawned.
/// Records are created on demand and retained for the process lifetime, like
/// the entries themselves.
#[derive(Debug, Default)]
struct KeyState {
    fetch_lock: Mutex<()>,
    refreshing: AtomicBool,
}

/// Releases the in-flight refresh claim when dropped.
///
/// Owned by the refresh task from before it is spawned, so the claim is
/// released even when the task panics or is dropped unpolled.
struct RefreshClaim {
    key: String,
    state: Arc<KeyState>,
}

impl Drop for RefreshClaim {
    fn drop(&mut self) {
        self.state.refreshing.store(false, Ordering::Release);
        tracing::trace!(key = %self.key, "released in-flight refresh claim");
    }
}

/// State shared by all handles to one cache instance.
struct CacheShared {
    entries: DashMap<String, StoredEntry>,
    keys: DashMap<String, Arc<KeyState>>,
    counters: Counters,
    connector: Arc<dyn Connector>,
    config: CacheConfig,
    closed: AtomicBool,
}

/// Stale-while-revalidate query cache.
///
/// One instance serves heterogeneous queries: values are stored type-erased
/// and downcast back at the retrieval boundary, so `"products:featured"` can
/// hold a product list while `"pages:about"` holds a single document.
///
/// The cache is a failure boundary: [`QueryCache::get`] and
/// [`QueryCache::get_with`] never return errors. A failed fetch is logged and
/// masked by stale data or the caller's fallback.
///
/// Handles are cheap to clone and share one underlying cache. The composition
/// root constructs the instance, hands out clones, and calls
/// [`QueryCache::shutdown`] when the process winds down.
///
/// # Example
///
/// ```ignore
/// let cache = QueryCache::with_connector(CacheConfig::default(), store.clone());
///
/// let shoes = cache
///     .get_with(
///         "products:collection:shoes",
///         Duration::from_millis(10_000),
///         Vec::new(),
///         move || async move { store.fetch_collection("shoes").await },
///     )
///     .await;
/// ```
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<CacheShared>,
}

impl QueryCache {
    /// Create a new cache with the given configuration and no connection
    /// step before fetches.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_connector(config, Arc::new(NoopConnector))
    }

    /// Create a new cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a new cache that runs `connector` before every miss-path and
    /// refresh fetch.
    pub fn with_connector(config: CacheConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                entries: DashMap::new(),
                keys: DashMap::new(),
                counters: Counters::default(),
                connector,
                config,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        self.shared.counters.snapshot(self.len())
    }

    /// Memoize `query` under `key` with the configured default TTL and the
    /// type's default value as fallback.
    ///
    /// See [`QueryCache::get_with`] for the full contract.
    pub async fn get<T, F, Fut>(&self, key: &str, query: F) -> CachedValue<T>
    where
        T: Default + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        self.get_with(key, self.shared.config.default_ttl, T::default(), query)
            .await
    }

    /// Memoize `query` under `key` with an explicit freshness window and
    /// fallback.
    ///
    /// - A fresh entry is returned immediately; `query` is not invoked.
    /// - A stale entry is returned immediately and at most one background
    ///   refresh per key is started behind it. The refresh outcome replaces
    ///   the entry only on success with a value; failures and empty results
    ///   leave the previous value in place.
    /// - On a miss the caller awaits the fetch. Concurrent first readers of
    ///   the same key coalesce behind a single fetch. If the fetch fails or
    ///   returns nothing, `fallback` is returned.
    ///
    /// `query` must be idempotent. It is never invoked concurrently with
    /// itself for the same key; no ordering is guaranteed across keys.
    ///
    /// This method never returns an error: fetch failures are logged and
    /// masked. After [`QueryCache::shutdown`] it degrades to a pass-through
    /// that runs `query` inline without caching.
    ///
    /// # Panics
    ///
    /// Panics if `key` was previously cached with a different value type;
    /// key reuse across types is a programmer error, not a runtime
    /// condition.
    pub async fn get_with<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fallback: T,
        query: F,
    ) -> CachedValue<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        debug_assert!(!key.is_empty(), "cache key must be non-empty");

        if self.is_closed() {
            return self.passthrough(key, fallback, query).await;
        }

        if let Some(read) = self.try_serve::<T>(key, ttl) {
            if read.is_stale() {
                self.spawn_refresh(key, ttl, query);
            }
            return read;
        }

        self.load_sync(key, ttl, fallback, query).await
    }

    /// Typed view of the entry stored under `key`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the entry was cached with a different value type, like
    /// [`QueryCache::get_with`].
    pub fn entry<T: Send + Sync + 'static>(&self, key: &str) -> Option<CacheEntry<T>> {
        let stored = self.shared.entries.get(key)?;
        let value = match stored.typed::<T>() {
            Some(value) => value,
            None => panic!("cache key {key:?} already holds a value of a different type"),
        };
        let refresh_in_flight = self
            .shared
            .keys
            .get(key)
            .map(|state| state.refreshing.load(Ordering::Acquire))
            .unwrap_or(false);

        Some(CacheEntry {
            key: key.to_owned(),
            value,
            fetched_at: stored.fetched_at(),
            cached_at: stored.cached_at(),
            refresh_in_flight,
        })
    }

    /// Drop the entry stored under `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.shared.entries.remove(key).is_some();
        if removed {
            tracing::debug!(key = %key, "invalidated cache entry");
        }
        removed
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many
    /// were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut removed = 0;
        self.shared.entries.retain(|key, _| {
            let matched = key.starts_with(prefix);
            if matched {
                removed += 1;
            }
            !matched
        });
        if removed > 0 {
            tracing::debug!(prefix = %prefix, removed, "invalidated cache entries by prefix");
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.shared.entries.clear();
        tracing::debug!("cleared all cache entries");
    }

    /// Shut the cache down: stop caching and background refreshes, drop all
    /// entries, and discard results from refreshes still in flight.
    ///
    /// Subsequent reads pass through to their queries uncached.
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.clear();
        tracing::debug!("query cache shut down");
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn key_state(&self, key: &str) -> Arc<KeyState> {
        self.shared.keys.entry(key.to_owned()).or_default().clone()
    }

    /// Serve from the entry map if an entry exists, recording hit stats.
    fn try_serve<T: Send + Sync + 'static>(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Option<CachedValue<T>> {
        let (value, cached_at, stale) = {
            let stored = self.shared.entries.get(key)?;
            let value = match stored.typed::<T>() {
                Some(value) => value,
                None => panic!("cache key {key:?} already holds a value of a different type"),
            };
            (value, stored.cached_at(), stored.is_stale(ttl))
        };

        if self.shared.config.track_stats {
            if stale {
                self.shared.counters.record_stale_hit();
            } else {
                self.shared.counters.record_hit();
            }
        }
        if stale {
            tracing::debug!(key = %key, "serving stale value");
        } else {
            tracing::trace!(key = %key, "cache hit");
        }

        Some(CachedValue::from_cache(value, cached_at, stale))
    }

    /// Miss path: fetch synchronously under the key's fetch lock.
    async fn load_sync<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fallback: T,
        query: F,
    ) -> CachedValue<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        let state = self.key_state(key);
        let _guard = state.fetch_lock.lock().await;

        // Whoever held the lock before us may have populated the entry.
        if let Some(read) = self.try_serve::<T>(key, ttl) {
            if read.is_stale() {
                self.spawn_refresh(key, ttl, query);
            }
            return read;
        }

        if self.shared.config.track_stats {
            self.shared.counters.record_miss();
        }
        tracing::debug!(key = %key, "cache miss; fetching synchronously");

        match self.run_query(query).await {
            Ok(Some(value)) => {
                let value = Arc::new(value);
                if !self.is_closed() {
                    self.shared
                        .entries
                        .insert(key.to_owned(), StoredEntry::new(Arc::clone(&value)));
                    // shutdown() can clear the map while this insert lands;
                    // sweep it back out.
                    if self.is_closed() {
                        self.shared.entries.remove(key);
                    }
                }
                CachedValue::from_load(value)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "query returned no data; serving fallback");
                if self.shared.config.track_stats {
                    self.shared.counters.record_fallback();
                }
                CachedValue::from_fallback(Arc::new(fallback))
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "query failed; serving fallback");
                if self.shared.config.track_stats {
                    self.shared.counters.record_fallback();
                }
                CachedValue::from_fallback(Arc::new(fallback))
            }
        }
    }

    /// Claim the key's refresh slot and spawn the background refresh.
    ///
    /// If another refresh already holds the claim, `query` is dropped unused.
    fn spawn_refresh<T, F, Fut>(&self, key: &str, ttl: Duration, query: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        let state = self.key_state(key);
        if state
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if self.shared.config.track_stats {
            self.shared.counters.record_refresh();
        }
        tracing::debug!(key = %key, "starting background refresh");

        // The claim travels with the task so it is released on any exit.
        let claim = RefreshClaim {
            key: key.to_owned(),
            state,
        };
        let cache = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            let _claim = claim;
            cache.refresh(&key, ttl, query).await;
        });
    }

    /// Body of a background refresh, run under the key's fetch lock.
    async fn refresh<T, F, Fut>(&self, key: &str, ttl: Duration, query: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        let state = self.key_state(key);
        let _guard = state.fetch_lock.lock().await;

        if self.is_closed() {
            tracing::debug!(key = %key, "cache shut down; skipping refresh");
            return;
        }
        // A synchronous load may have replaced the entry while we queued.
        let fresh_again = self
            .shared
            .entries
            .get(key)
            .map(|entry| !entry.is_stale(ttl))
            .unwrap_or(false);
        if fresh_again {
            tracing::debug!(key = %key, "entry already refreshed; skipping");
            return;
        }

        match self.run_query(query).await {
            Ok(Some(value)) => {
                if self.is_closed() {
                    tracing::warn!(key = %key, "discarding refresh result after shutdown");
                    return;
                }
                self.shared
                    .entries
                    .insert(key.to_owned(), StoredEntry::new(Arc::new(value)));
                // shutdown() can clear the map while this insert lands; sweep
                // it back out.
                if self.is_closed() {
                    self.shared.entries.remove(key);
                    tracing::warn!(key = %key, "discarding refresh result after shutdown");
                    return;
                }
                tracing::debug!(key = %key, "background refresh replaced value");
            }
            Ok(None) => {
                tracing::debug!(key = %key, "refresh returned no data; keeping cached value");
            }
            Err(err) => {
                if self.shared.config.track_stats {
                    self.shared.counters.record_refresh_failure();
                }
                tracing::warn!(
                    key = %key,
                    error = %err,
                    "background refresh failed; keeping cached value"
                );
            }
        }
    }

    /// Establish the data-source connection and run one query, bounded by
    /// the configured fetch timeout.
    async fn run_query<T, F, Fut>(&self, query: F) -> VitrineResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = VitrineResult<Option<T>>>,
    {
        let connector = Arc::clone(&self.shared.connector);
        let fetch = async move {
            connector.ensure_connected().await?;
            query().await
        };

        match self.shared.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(DataSourceError::Timeout { waited: limit }.into()),
            },
            None => fetch.await,
        }
    }

    /// Post-shutdown reads: run the query inline, cache nothing.
    async fn passthrough<T, F, Fut>(&self, key: &str, fallback: T, query: F) -> CachedValue<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = VitrineResult<Option<T>>> + Send + 'static,
    {
        tracing::debug!(key = %key, "cache shut down; passing query through");
        let state = self.key_state(key);
        let _guard = state.fetch_lock.lock().await;

        match self.run_query(query).await {
            Ok(Some(value)) => CachedValue::from_load(Arc::new(value)),
            Ok(None) => CachedValue::from_fallback(Arc::new(fallback)),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "query failed; serving fallback");
                CachedValue::from_fallback(Arc::new(fallback))
            }
        }
    }
}
