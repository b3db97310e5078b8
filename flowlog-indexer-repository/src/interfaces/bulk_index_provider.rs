//! Bulk index provider trait definition.
//!
//! This module defines the abstract interface for writing documents to the
//! indexing backend, allowing for different backend implementations
//! (OpenSearch, Elasticsearch, a test double).

use async_trait::async_trait;

use crate::errors::BulkWriteError;
use flowlog_indexer_shared::{FlowRecord, ItemFailure};

/// One document of a bulk request.
#[derive(Debug, Clone, Copy)]
pub struct BulkDocument<'a> {
    /// Explicit document id; `None` lets the backend assign one.
    pub id: Option<&'a str>,
    pub record: &'a FlowRecord,
}

/// Outcome of one document of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkItemOutcome {
    Indexed,
    Failed(ItemFailure),
}

impl BulkItemOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, BulkItemOutcome::Indexed)
    }
}

/// Abstracts the indexing backend's bulk write API.
///
/// Implementations are injected into the index writer as
/// `Arc<dyn BulkIndexProvider>`; one authenticated client is shared by every
/// object of an invocation.
#[async_trait]
pub trait BulkIndexProvider: Send + Sync {
    /// Write all `documents` to `index` in a single bulk call.
    ///
    /// # Returns
    ///
    /// * `Ok(outcomes)` - One outcome per document, in request order
    /// * `Err(BulkWriteError)` - If the request failed as a whole
    async fn bulk_write(
        &self,
        index: &str,
        documents: &[BulkDocument<'_>],
    ) -> Result<Vec<BulkItemOutcome>, BulkWriteError>;

    /// Check if the backend is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the backend is healthy
    /// * `Ok(false)` - If the backend is unhealthy
    /// * `Err(BulkWriteError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, BulkWriteError>;
}
