//! Read results with explicit provenance.
//!
//! Traditional caches hide how a value was obtained, which makes degraded
//! reads indistinguishable from healthy ones. Every cache read here returns a
//! [`CachedValue`] that says whether the value was fresh, served stale while
//! a refresh runs, loaded synchronously, or substituted by the fallback.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vitrine_core::Timestamp;

/// Where the value of a cache read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from cache within its freshness window.
    Fresh,
    /// Served from cache past its freshness window; a refresh may be running.
    Stale,
    /// Fetched synchronously on a miss and cached.
    Loaded,
    /// No cached data and the fetch failed or returned nothing.
    Fallback,
}

/// Result of a cache read, carrying the value plus read metadata.
#[derive(Debug, Clone)]
pub struct CachedValue<T> {
    /// The returned value, shared with concurrent readers of the same entry.
    pub value: Arc<T>,
    /// Wall-clock time the value was produced. For fallback reads this is the
    /// response time; there was no fetch to date.
    pub cached_at: Timestamp,
    /// How this read was satisfied.
    pub source: ReadSource,
}

impl<T> CachedValue<T> {
    /// Construct a read served from an existing cache entry.
    pub fn from_cache(value: Arc<T>, cached_at: Timestamp, stale: bool) -> Self {
        Self {
            value,
            cached_at,
            source: if stale {
                ReadSource::Stale
            } else {
                ReadSource::Fresh
            },
        }
    }

    /// Construct a read satisfied by a synchronous fetch.
    pub fn from_load(value: Arc<T>) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            source: ReadSource::Loaded,
        }
    }

    /// Construct a read satisfied by the fallback value.
    pub fn from_fallback(value: Arc<T>) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            source: ReadSource::Fallback,
        }
    }

    /// Whether this read was served from cached data.
    pub fn is_hit(&self) -> bool {
        matches!(self.source, ReadSource::Fresh | ReadSource::Stale)
    }

    /// Whether this read served data past its freshness window.
    pub fn is_stale(&self) -> bool {
        self.source == ReadSource::Stale
    }

    /// Whether this read fell back to the caller-supplied default.
    pub fn is_fallback(&self) -> bool {
        self.source == ReadSource::Fallback
    }

    /// Wall-clock age of the returned value.
    pub fn staleness(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Unwrap into the shared value, discarding read metadata.
    pub fn into_value(self) -> Arc<T> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cache_fresh() {
        let read = CachedValue::from_cache(Arc::new(7i32), Utc::now(), false);
        assert_eq!(read.source, ReadSource::Fresh);
        assert!(read.is_hit());
        assert!(!read.is_stale());
        assert!(!read.is_fallback());
        assert_eq!(*read.into_value(), 7);
    }

    #[test]
    fn test_from_cache_stale() {
        let read = CachedValue::from_cache(Arc::new("v".to_string()), Utc::now(), true);
        assert_eq!(read.source, ReadSource::Stale);
        assert!(read.is_hit());
        assert!(read.is_stale());
    }

    #[test]
    fn test_from_load_and_fallback() {
        let loaded = CachedValue::from_load(Arc::new(1i32));
        assert_eq!(loaded.source, ReadSource::Loaded);
        assert!(!loaded.is_hit());

        let fallback = CachedValue::from_fallback(Arc::new(0i32));
        assert_eq!(fallback.source, ReadSource::Fallback);
        assert!(fallback.is_fallback());
    }

    #[test]
    fn test_staleness_counts_from_cached_at() {
        let cached_at = Utc::now() - chrono::Duration::seconds(30);
        let read = CachedValue::from_cache(Arc::new(1i32), cached_at, true);
        assert!(read.staleness() >= Duration::from_secs(30));
    }
}
