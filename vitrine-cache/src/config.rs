//! Configuration for the query cache.

use std::time::Duration;

/// Freshness window applied when a read does not specify its own TTL.
pub const DEFAULT_TTL: Duration = Duration::from_millis(10_000);

/// Configuration for the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Freshness window for reads that do not pass an explicit TTL.
    pub default_ttl: Duration,
    /// Upper bound on one fetch (connection establishment plus query).
    /// `None` disables the bound; a hung query then blocks the miss path.
    pub query_timeout: Option<Duration>,
    /// Whether to record hit/miss/refresh statistics.
    pub track_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            query_timeout: Some(Duration::from_secs(10)),
            track_stats: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set or disable the fetch timeout.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Enable or disable statistics tracking.
    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.track_stats = enabled;
        self
    }
}
