//! Data-store abstraction behind the storefront reads.

use std::sync::Arc;

use async_trait::async_trait;
use vitrine_cache::Connector;
use vitrine_core::VitrineResult;

/// A stored document. Schema definitions are the data store's concern.
pub type Document = serde_json::Value;

/// Asynchronous document store serving the storefront collections.
///
/// Implementations own connection management. `ensure_connected` is invoked
/// before every uncached fetch and must be cheap when a connection is
/// already established.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Establish or verify the connection to the store.
    async fn ensure_connected(&self) -> VitrineResult<()>;

    /// Fetch all documents in `collection` matching `filter`.
    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
    ) -> VitrineResult<Vec<Document>>;

    /// Fetch one document in `collection` matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> VitrineResult<Option<Document>>;
}

/// Adapter exposing a [`DataStore`]'s connection step as the cache's
/// [`Connector`] seam.
pub struct SourceConnector<S> {
    store: Arc<S>,
}

impl<S> SourceConnector<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DataStore> Connector for SourceConnector<S> {
    async fn ensure_connected(&self) -> VitrineResult<()> {
        self.store.ensure_connected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl DataStore for CountingStore {
        async fn ensure_connected(&self) -> VitrineResult<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn find_documents(
            &self,
            _collection: &str,
            _filter: Document,
        ) -> VitrineResult<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn find_one(
            &self,
            _collection: &str,
            _filter: Document,
        ) -> VitrineResult<Option<Document>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_source_connector_forwards_to_store() {
        let store = Arc::new(CountingStore {
            connects: AtomicUsize::new(0),
        });
        let connector = SourceConnector::new(Arc::clone(&store));

        connector.ensure_connected().await.unwrap();
        connector.ensure_connected().await.unwrap();

        assert_eq!(store.connects.load(Ordering::SeqCst), 2);
    }
}
