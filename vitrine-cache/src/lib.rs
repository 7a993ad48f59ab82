//! Vitrine Cache - Stale-While-Revalidate Query Cache
//!
//! An in-process, key-addressed, TTL-based cache that memoizes the result of
//! an arbitrary asynchronous read operation (typically a data-store query),
//! serving stale data while a refresh runs in the background and falling back
//! to the last-known-good value or a caller-supplied default on failure.
//!
//! # Design Philosophy
//!
//! The cache is a failure boundary. Page-rendering code calling [`QueryCache::get`]
//! never sees a failed read: query errors are logged and masked, and at worst
//! the caller receives stale or fallback data. Staleness is not hidden either;
//! every read returns a [`CachedValue`] that says where the value came from.
//!
//! # Concurrency
//!
//! The entry map is a concurrent map. Per key, an async fetch lock serializes
//! every query invocation (concurrent first readers coalesce behind one
//! fetch), and an atomic claim taken by compare-and-swap guarantees at most
//! one background refresh is in flight per key.
//!
//! # Example
//!
//! ```ignore
//! let cache = QueryCache::with_defaults();
//!
//! let shoes = cache
//!     .get_with("products:collection:shoes", Duration::from_millis(10_000), Vec::new(), || async {
//!         fetch_products("shoes").await
//!     })
//!     .await;
//!
//! // Serve the page with whatever came back; a refresh may be running behind it.
//! if shoes.is_stale() {
//!     tracing::debug!("rendering with stale product data");
//! }
//! render(shoes.into_value());
//! ```

pub mod config;
pub mod connector;
pub mod entry;
pub mod read;
pub mod stats;
pub mod swr;

pub use config::{CacheConfig, DEFAULT_TTL};
pub use connector::{Connector, NoopConnector};
pub use entry::CacheEntry;
pub use read::{CachedValue, ReadSource};
pub use stats::CacheStats;
pub use swr::QueryCache;
