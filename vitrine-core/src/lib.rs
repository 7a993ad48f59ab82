//! Vitrine Core - Shared Types
//!
//! Pure data types with no behavior beyond error formatting. The cache and
//! storefront crates both depend on this; it depends on nothing internal.

use chrono::{DateTime, Utc};

pub mod error;

pub use error::{DataSourceError, VitrineError, VitrineResult};

// ============================================================================
// COMMON ALIASES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds, for TTL values crossing an env/config boundary.
pub type DurationMs = u64;
