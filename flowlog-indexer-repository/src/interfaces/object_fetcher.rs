//! Object fetcher trait definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::FetchError;
use flowlog_indexer_shared::LogObjectReference;

/// Reads the raw (still compressed) content of a log object.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Fetch the object identified by `object`.
    ///
    /// # Returns
    ///
    /// * `Ok(Bytes)` - The compressed object content
    /// * `Err(FetchError)` - If the object is missing, forbidden or the store is unavailable
    async fn fetch(&self, object: &LogObjectReference) -> Result<Bytes, FetchError>;
}
