//! Read-layer configuration.

use std::time::Duration;

use vitrine_core::DurationMs;

/// Freshness windows for each storefront read domain.
///
/// Loaded from `VITRINE_TTL_*_MS` environment variables when present.
/// Missing or malformed overrides fall back to the defaults, so settings
/// loading never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSettings {
    /// Product lists and single-product reads.
    pub products_ttl: Duration,
    /// Collection listings.
    pub collections_ttl: Duration,
    /// Blog post reads.
    pub blog_ttl: Duration,
    /// Active coupon lookups.
    pub coupons_ttl: Duration,
    /// Customer order history.
    pub orders_ttl: Duration,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            products_ttl: Duration::from_millis(10_000),
            collections_ttl: Duration::from_millis(60_000),
            blog_ttl: Duration::from_millis(60_000),
            coupons_ttl: Duration::from_millis(30_000),
            orders_ttl: Duration::from_millis(10_000),
        }
    }
}

impl ReadSettings {
    /// Create settings from environment variables.
    ///
    /// Reads `VITRINE_TTL_PRODUCTS_MS`, `VITRINE_TTL_COLLECTIONS_MS`,
    /// `VITRINE_TTL_BLOG_MS`, `VITRINE_TTL_COUPONS_MS` and
    /// `VITRINE_TTL_ORDERS_MS`, each a millisecond count.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            products_ttl: env_ttl("VITRINE_TTL_PRODUCTS_MS", defaults.products_ttl),
            collections_ttl: env_ttl("VITRINE_TTL_COLLECTIONS_MS", defaults.collections_ttl),
            blog_ttl: env_ttl("VITRINE_TTL_BLOG_MS", defaults.blog_ttl),
            coupons_ttl: env_ttl("VITRINE_TTL_COUPONS_MS", defaults.coupons_ttl),
            orders_ttl: env_ttl("VITRINE_TTL_ORDERS_MS", defaults.orders_ttl),
        }
    }
}

fn env_ttl(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<DurationMs>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                tracing::warn!(var = %var, value = %raw, "ignoring malformed TTL override");
                default
            }
        },
        Err(_) => default,
    }
}
