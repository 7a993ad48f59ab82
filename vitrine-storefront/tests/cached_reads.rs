//! Integration tests: `StoreReads` over a scripted document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use vitrine_core::{DataSourceError, VitrineResult};
use vitrine_storefront::{DataStore, Document, StoreReads};

/// In-memory document store with scriptable failures.
struct MockStore {
    connects: AtomicUsize,
    queries: AtomicUsize,
    fail_queries: AtomicBool,
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MockStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            collections: Mutex::new(HashMap::new()),
        })
    }

    fn insert(&self, collection: &str, doc: Document) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    fn clear(&self, collection: &str) {
        self.collections.lock().unwrap().remove(collection);
    }

    fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for MockStore {
    async fn ensure_connected(&self) -> VitrineResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
    ) -> VitrineResult<Vec<Document>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DataSourceError::QueryFailed {
                collection: collection.to_string(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        let docs = self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default();
        Ok(matching(docs, &filter))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> VitrineResult<Option<Document>> {
        Ok(self
            .find_documents(collection, filter)
            .await?
            .into_iter()
            .next())
    }
}

fn matching(docs: Vec<Document>, filter: &Document) -> Vec<Document> {
    let Some(conditions) = filter.as_object() else {
        return docs;
    };
    docs.into_iter()
        .filter(|doc| {
            conditions
                .iter()
                .all(|(field, want)| doc.get(field) == Some(want))
        })
        .collect()
}

fn product(slug: &str, featured: bool) -> Document {
    json!({ "slug": slug, "collection": "shoes", "featured": featured })
}

/// Let spawned refresh tasks run to completion on the test runtime.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_repeated_reads_hit_the_store_once_per_window() {
    let store = MockStore::new();
    store.insert("products", product("runner", true));
    store.insert("products", product("loafer", false));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let first = reads.featured_products().await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["slug"], "runner");
    assert_eq!(store.query_count(), 1);
    assert_eq!(store.connects.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    let second = reads.featured_products().await;
    assert_eq!(second.len(), 1);
    assert_eq!(store.query_count(), 1);

    let stats = reads.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_window_serves_old_data_then_refreshes() {
    let store = MockStore::new();
    store.insert("products", product("runner", false));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let first = reads.products_in_collection("shoes").await;
    assert_eq!(first.len(), 1);

    store.insert("products", product("sandal", false));
    tokio::time::advance(Duration::from_secs(11)).await;

    // The expired window serves the old listing and refreshes behind it.
    let stale = reads.products_in_collection("shoes").await;
    assert_eq!(stale.len(), 1);
    settle().await;

    let fresh = reads.products_in_collection("shoes").await;
    assert_eq!(fresh.len(), 2);
    assert_eq!(reads.cache().stats().refreshes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_masked_by_cached_data() {
    let store = MockStore::new();
    store.insert("products", product("runner", true));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let first = reads.featured_products().await;
    assert_eq!(first.len(), 1);

    store.fail_queries(true);
    tokio::time::advance(Duration::from_secs(11)).await;

    let stale = reads.featured_products().await;
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0]["slug"], "runner");
    settle().await;

    // The failed refresh left the listing in place.
    let after = reads.featured_products().await;
    assert_eq!(after.len(), 1);
    assert!(reads.cache().stats().refresh_failures >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_emptied_store_keeps_serving_cached_data() {
    let store = MockStore::new();
    store.insert("products", product("runner", true));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let first = reads.featured_products().await;
    assert_eq!(first.len(), 1);

    store.clear("products");
    tokio::time::advance(Duration::from_secs(11)).await;

    let stale = reads.featured_products().await;
    assert_eq!(stale.len(), 1);
    settle().await;

    // The refresh found nothing and kept the last non-empty listing.
    assert_eq!(store.query_count(), 2);
    let after = reads.featured_products().await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0]["slug"], "runner");
    assert_eq!(reads.cache().stats().refresh_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_miss_against_failing_or_empty_store_yields_empty_uncached() {
    let store = MockStore::new();
    store.fail_queries(true);
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let coupons = reads.active_coupons().await;
    assert!(coupons.is_empty());
    assert!(reads.cache().is_empty());

    // An empty result set is not cached either; the next read queries again.
    store.fail_queries(false);
    let posts = reads.blog_posts().await;
    assert!(posts.is_empty());
    assert!(reads.cache().is_empty());

    let before = store.query_count();
    reads.blog_posts().await;
    assert_eq!(store.query_count(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_product_slug_yields_null() {
    let store = MockStore::new();
    store.insert("products", product("runner", false));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let missing = reads.product_by_slug("vaporwave").await;
    assert!(missing.is_null());
    assert!(reads.cache().is_empty());

    let found = reads.product_by_slug("runner").await;
    assert_eq!(found["slug"], "runner");
    assert_eq!(reads.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_product_change_invalidates_product_reads() {
    let store = MockStore::new();
    store.insert("products", product("runner", true));
    store.insert("collections", json!({ "slug": "shoes", "published": true }));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    reads.featured_products().await;
    reads.products_in_collection("shoes").await;
    reads.product_by_slug("runner").await;
    reads.collections().await;
    assert_eq!(reads.cache().len(), 4);

    reads.product_changed("runner");
    assert!(reads.cache().is_empty());

    let before = store.query_count();
    reads.featured_products().await;
    assert_eq!(store.query_count(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_orders_cached_per_customer() {
    let store = MockStore::new();
    store.insert("orders", json!({ "customer_id": "cust-1", "total": 40 }));
    store.insert("orders", json!({ "customer_id": "cust-2", "total": 90 }));
    let reads = StoreReads::with_defaults(Arc::clone(&store));

    let first = reads.orders_for_customer("cust-1").await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["total"], 40);

    let other = reads.orders_for_customer("cust-2").await;
    assert_eq!(other.len(), 1);
    assert_eq!(other[0]["total"], 90);
    assert_eq!(reads.cache().len(), 2);

    reads.orders_changed("cust-1");
    assert_eq!(reads.cache().len(), 1);
}
