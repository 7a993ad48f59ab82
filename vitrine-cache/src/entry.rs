//! Cache entry storage and the typed entry view.
//!
//! One cache instance serves queries of many result types, so the shared map
//! stores type-erased values and the retrieval boundary downcasts back to the
//! caller's type. [`CacheEntry`] is the typed view handed out by the
//! inspector; [`StoredEntry`] is the erased record the map actually holds.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use vitrine_core::Timestamp;

/// A typed view of one cached query result.
///
/// `age` and staleness are computed against the monotonic fetch instant, not
/// the wall clock, so a clock step cannot expire or resurrect an entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The key this entry is stored under.
    pub key: String,
    /// The cached result, shared with concurrent readers.
    pub value: Arc<T>,
    /// Monotonic instant when `value` was last successfully produced.
    pub fetched_at: Instant,
    /// Wall-clock time of the last successful fetch, for reporting.
    pub cached_at: Timestamp,
    /// Whether a background refresh for this key is currently running.
    pub refresh_in_flight: bool,
}

impl<T> CacheEntry<T> {
    /// Time elapsed since the value was last fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Whether this entry is past the given freshness window.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// Type-erased entry as held by the shared map.
#[derive(Clone)]
pub(crate) struct StoredEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    cached_at: Timestamp,
}

impl StoredEntry {
    pub(crate) fn new<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            cached_at: Utc::now(),
        }
    }

    /// Downcast the stored value back to the caller's type.
    ///
    /// Returns `None` when the entry was stored under a different type, which
    /// callers treat as a programmer error.
    pub(crate) fn typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub(crate) fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub(crate) fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    pub(crate) fn is_stale(&self, ttl: Duration) -> bool {
        Self::is_stale_at(self.fetched_at, Instant::now(), ttl)
    }

    /// Pure staleness predicate: stale once `now - fetched_at >= ttl`.
    pub(crate) fn is_stale_at(fetched_at: Instant, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(fetched_at) >= ttl
    }
}

impl std::fmt::Debug for StoredEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredEntry")
            .field("fetched_at", &self.fetched_at)
            .field("cached_at", &self.cached_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let stored = StoredEntry::new(Arc::new(vec![1u32, 2, 3]));
        let value = stored.typed::<Vec<u32>>().expect("type should match");
        assert_eq!(*value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_typed_wrong_type_is_none() {
        let stored = StoredEntry::new(Arc::new("hello".to_string()));
        assert!(stored.typed::<Vec<u32>>().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_crosses_ttl_boundary() {
        let stored = StoredEntry::new(Arc::new(1i32));
        let ttl = Duration::from_millis(10_000);

        assert!(!stored.is_stale(ttl));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(!stored.is_stale(ttl));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(stored.is_stale(ttl));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_age_tracks_clock() {
        let stored = StoredEntry::new(Arc::new(1i32));
        tokio::time::advance(Duration::from_secs(5)).await;

        let entry = CacheEntry {
            key: "k".to_string(),
            value: stored.typed::<i32>().expect("type should match"),
            fetched_at: stored.fetched_at(),
            cached_at: stored.cached_at(),
            refresh_in_flight: false,
        };
        assert_eq!(entry.age(), Duration::from_secs(5));
        assert!(entry.is_stale(Duration::from_secs(5)));
        assert!(!entry.is_stale(Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_immediately_stale() {
        let stored = StoredEntry::new(Arc::new(1i32));
        assert!(stored.is_stale(Duration::ZERO));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: staleness is exactly `elapsed >= ttl` for any elapsed
        /// time and any TTL expressible in milliseconds.
        #[test]
        fn prop_staleness_matches_elapsed_comparison(
            elapsed_ms in 0u64..1_000_000,
            ttl_ms in 0u64..1_000_000,
        ) {
            let fetched_at = Instant::now();
            let now = fetched_at + Duration::from_millis(elapsed_ms);
            let stale = StoredEntry::is_stale_at(fetched_at, now, Duration::from_millis(ttl_ms));
            prop_assert_eq!(stale, elapsed_ms >= ttl_ms);
        }

        /// Property: a clock that appears to run backwards never makes an
        /// entry stale (saturating arithmetic).
        #[test]
        fn prop_backwards_clock_is_never_stale(
            back_ms in 1u64..1_000_000,
            ttl_ms in 1u64..1_000_000,
        ) {
            let now = Instant::now();
            let fetched_at = now + Duration::from_millis(back_ms);
            let stale = StoredEntry::is_stale_at(fetched_at, now, Duration::from_millis(ttl_ms));
            prop_assert!(!stale);
        }
    }
}
