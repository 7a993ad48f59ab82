//! Cached storefront read operations.
//!
//! This module provides a `StoreReads` wrapper that transparently integrates
//! caching with document reads. Page-rendering code calls the read methods
//! unchanged, and the cache is used transparently: repeated renders within a
//! domain's freshness window reuse one materialized result, and a failing
//! store degrades to stale or empty data instead of an error.
//!
//! Writes happen elsewhere. Admin mutation paths call the invalidation
//! helpers here so the next read refetches.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vitrine_cache::{CacheConfig, QueryCache};

use crate::settings::ReadSettings;
use crate::source::{DataStore, Document, SourceConnector};

/// Treat an empty result set as "no usable result" so a refresh that finds
/// nothing keeps serving the previously cached documents.
fn non_empty(docs: Vec<Document>) -> Option<Vec<Document>> {
    if docs.is_empty() {
        None
    } else {
        Some(docs)
    }
}

/// Cached read operations over a [`DataStore`].
///
/// Every method returns the shared documents directly rather than a
/// `Result`; fetch failures are logged by the cache and masked with stale or
/// empty data. List reads return `Arc<Vec<Document>>`, single-document reads
/// return `Arc<Document>` with `Document::Null` standing in for "not found".
pub struct StoreReads<S> {
    store: Arc<S>,
    cache: QueryCache,
    settings: ReadSettings,
}

impl<S> Clone for StoreReads<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: DataStore> StoreReads<S> {
    /// Create the read layer over `store`.
    ///
    /// The cache establishes the store's connection before every uncached
    /// fetch via [`SourceConnector`].
    pub fn new(store: Arc<S>, config: CacheConfig, settings: ReadSettings) -> Self {
        let connector = Arc::new(SourceConnector::new(Arc::clone(&store)));
        Self {
            store,
            cache: QueryCache::with_connector(config, connector),
            settings,
        }
    }

    /// Create the read layer with default cache configuration and settings.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, CacheConfig::default(), ReadSettings::default())
    }

    /// The underlying cache, for diagnostics and shutdown.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn cached_list(
        &self,
        key: &str,
        ttl: Duration,
        collection: &'static str,
        filter: Document,
    ) -> Arc<Vec<Document>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_with(key, ttl, Vec::new(), move || async move {
                let docs = store.find_documents(collection, filter).await?;
                Ok(non_empty(docs))
            })
            .await
            .into_value()
    }

    async fn cached_one(
        &self,
        key: &str,
        ttl: Duration,
        collection: &'static str,
        filter: Document,
    ) -> Arc<Document> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_with(key, ttl, Document::Null, move || async move {
                store.find_one(collection, filter).await
            })
            .await
            .into_value()
    }

    // ========================================================================
    // PRODUCT READS
    // ========================================================================

    /// Featured products for the home page.
    pub async fn featured_products(&self) -> Arc<Vec<Document>> {
        self.cached_list(
            "products:featured",
            self.settings.products_ttl,
            "products",
            json!({ "featured": true }),
        )
        .await
    }

    /// Products in the collection named by `slug`.
    pub async fn products_in_collection(&self, slug: &str) -> Arc<Vec<Document>> {
        self.cached_list(
            &format!("products:collection:{slug}"),
            self.settings.products_ttl,
            "products",
            json!({ "collection": slug }),
        )
        .await
    }

    /// A single product by URL slug. `Document::Null` when unknown.
    pub async fn product_by_slug(&self, slug: &str) -> Arc<Document> {
        self.cached_one(
            &format!("products:slug:{slug}"),
            self.settings.products_ttl,
            "products",
            json!({ "slug": slug }),
        )
        .await
    }

    // ========================================================================
    // COLLECTION READS
    // ========================================================================

    /// All published collections, for navigation.
    pub async fn collections(&self) -> Arc<Vec<Document>> {
        self.cached_list(
            "collections:all",
            self.settings.collections_ttl,
            "collections",
            json!({ "published": true }),
        )
        .await
    }

    // ========================================================================
    // BLOG READS
    // ========================================================================

    /// Published blog posts, newest first as stored.
    pub async fn blog_posts(&self) -> Arc<Vec<Document>> {
        self.cached_list(
            "blog:posts",
            self.settings.blog_ttl,
            "blog_posts",
            json!({ "published": true }),
        )
        .await
    }

    /// A single blog post by URL slug. `Document::Null` when unknown.
    pub async fn blog_post_by_slug(&self, slug: &str) -> Arc<Document> {
        self.cached_one(
            &format!("blog:slug:{slug}"),
            self.settings.blog_ttl,
            "blog_posts",
            json!({ "slug": slug }),
        )
        .await
    }

    // ========================================================================
    // COUPON READS
    // ========================================================================

    /// Coupons currently active storewide.
    pub async fn active_coupons(&self) -> Arc<Vec<Document>> {
        self.cached_list(
            "coupons:active",
            self.settings.coupons_ttl,
            "coupons",
            json!({ "active": true }),
        )
        .await
    }

    // ========================================================================
    // ORDER READS
    // ========================================================================

    /// Order history for one customer's account page.
    pub async fn orders_for_customer(&self, customer_id: &str) -> Arc<Vec<Document>> {
        self.cached_list(
            &format!("orders:customer:{customer_id}"),
            self.settings.orders_ttl,
            "orders",
            json!({ "customer_id": customer_id }),
        )
        .await
    }

    // ========================================================================
    // WRITE-SIDE INVALIDATION
    // ========================================================================

    /// Drop product reads after a product mutation.
    ///
    /// Collection listings and the featured list key off product data, so
    /// they go too.
    pub fn product_changed(&self, slug: &str) {
        self.cache.invalidate(&format!("products:slug:{slug}"));
        self.cache.invalidate("products:featured");
        self.cache.invalidate_prefix("products:collection:");
        self.cache.invalidate("collections:all");
    }

    /// Drop blog reads after a post mutation.
    pub fn blog_changed(&self, slug: &str) {
        self.cache.invalidate(&format!("blog:slug:{slug}"));
        self.cache.invalidate("blog:posts");
    }

    /// Drop the active-coupon read after a coupon mutation.
    pub fn coupons_changed(&self) {
        self.cache.invalidate("coupons:active");
    }

    /// Drop one customer's order history after an order mutation.
    pub fn orders_changed(&self, customer_id: &str) {
        self.cache.invalidate(&format!("orders:customer:{customer_id}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_maps_empty_to_none() {
        assert_eq!(non_empty(Vec::new()), None);
        let docs = vec![json!({ "slug": "runner" })];
        assert_eq!(non_empty(docs.clone()), Some(docs));
    }
}
