//! Data-source connection seam.

use async_trait::async_trait;
use vitrine_core::VitrineResult;

/// Connection-establishment hook run before any fetch.
///
/// The cache does not own a connection pool; it only guarantees the
/// collaborator behind the injected queries has been asked to connect before
/// a miss-path or refresh fetch executes. Implementations must be idempotent:
/// the hook runs once per fetch, not once per process.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Ensure the underlying data source is reachable.
    async fn ensure_connected(&self) -> VitrineResult<()>;
}

/// Connector for data sources that need no connection step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnector;

#[async_trait]
impl Connector for NoopConnector {
    async fn ensure_connected(&self) -> VitrineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_connector_always_succeeds() {
        assert!(NoopConnector.ensure_connected().await.is_ok());
    }
}
