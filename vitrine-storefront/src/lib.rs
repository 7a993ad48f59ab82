//! Vitrine Storefront - Cached Read Layer
//!
//! The read operations page-rendering code calls: each wraps one document
//! query in the stale-while-revalidate cache, so repeated renders of the
//! same page reuse one materialized result and a failing data store degrades
//! pages to stale or empty data instead of errors.
//!
//! Documents are opaque [`serde_json::Value`]s throughout. Their schemas
//! belong to the data store, not to this crate.

pub mod reads;
pub mod settings;
pub mod source;

pub use reads::StoreReads;
pub use settings::ReadSettings;
pub use source::{DataStore, Document, SourceConnector};
