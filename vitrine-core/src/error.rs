//! Error types for vitrine operations

use std::time::Duration;
use thiserror::Error;

/// Data-source errors.
///
/// Produced by `DataStore` implementations, by connectors establishing the
/// underlying connection, and by the cache's fetch timeout. The cache layer
/// absorbs these at its failure boundary; they reach application code only
/// through logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("Connection to data source failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Query against {collection} failed: {reason}")]
    QueryFailed { collection: String, reason: String },

    #[error("Fetch timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Could not decode document: {reason}")]
    Decode { reason: String },
}

/// Master error type for all vitrine errors.
#[derive(Debug, Clone, Error)]
pub enum VitrineError {
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),
}

/// Result type alias for vitrine operations.
pub type VitrineResult<T> = Result<T, VitrineError>;

// =============================================================================
// TESTS
// =============================================================================
