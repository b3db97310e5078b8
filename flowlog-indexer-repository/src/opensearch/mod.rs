//! OpenSearch implementation of the bulk index provider.
//!
//! This module provides a concrete implementation of `BulkIndexProvider`
//! using OpenSearch's `_bulk` API as the backend.

mod client;
mod config;
mod response;

pub use client::OpenSearchClient;
pub use config::{OpenSearchAuth, OpenSearchConfig, DEFAULT_SIGV4_SERVICE};
pub use response::{classify_item, parse_bulk_response};
