//! Loader module for the flow-log indexer pipeline.
//!
//! Writes batches to the index through the bulk API.

mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use flowlog_indexer_repository::{
    BulkDocument, BulkIndexProvider, BulkItemOutcome, BulkWriteError,
};
use flowlog_indexer_shared::{
    Batch, FailedRecord, FlowRecord, ItemFailure, LogObjectReference, WriteResult,
};

/// Default target index.
pub const DEFAULT_INDEX_NAME: &str = "vpc-flow-logs";

/// Reason recorded for items whose retry would have crossed the deadline.
pub const DEADLINE_REASON: &str = "deadline reached before retry";

/// Configuration for the index writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Index every document is written to.
    pub index_name: String,
    pub retry: RetryPolicy,
    /// Derive document ids from the object and line, so a resent document
    /// overwrites itself instead of creating a duplicate.
    pub deterministic_ids: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            retry: RetryPolicy::default(),
            deterministic_ids: true,
        }
    }
}

/// Stable document id for the record at `ordinal` of `source`.
pub fn document_id(source: &LogObjectReference, ordinal: u64) -> String {
    let name = format!("{}/{}#{}", source.container, source.key, ordinal);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Writer that delivers batches to the indexing backend.
///
/// Each attempt is one bulk call. Items the backend accepted are never sent
/// again; items that failed retryably are resent after a backoff, items that
/// failed terminally are recorded immediately.
pub struct IndexWriter {
    provider: Arc<dyn BulkIndexProvider>,
    config: WriterConfig,
}

impl IndexWriter {
    /// Create a new index writer with the default configuration.
    pub fn new(provider: Arc<dyn BulkIndexProvider>) -> Self {
        Self {
            provider,
            config: WriterConfig::default(),
        }
    }

    /// Create a new index writer with custom configuration.
    pub fn with_config(provider: Arc<dyn BulkIndexProvider>, config: WriterConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write one batch.
    ///
    /// # Arguments
    ///
    /// * `batch` - The records to write, all from the same object
    /// * `deadline` - No retry is started whose backoff would end after it
    ///
    /// # Returns
    ///
    /// * `Ok(WriteResult)` - Every record of the batch, either accepted or failed
    /// * `Err(PipelineError)` - If the backend answered with an unusable response
    #[instrument(skip(self, batch, deadline), fields(object = %batch.source(), records = batch.len()))]
    pub async fn write(
        &self,
        batch: Batch,
        deadline: Option<Instant>,
    ) -> Result<WriteResult, PipelineError> {
        let source = batch.source().clone();
        let records = batch.into_records();
        let ids: Vec<Option<String>> = records
            .iter()
            .map(|record| {
                self.config
                    .deterministic_ids
                    .then(|| document_id(&source, record.ordinal()))
            })
            .collect();

        let mut result = WriteResult::default();
        let mut permanent: Vec<(usize, ItemFailure)> = Vec::new();
        let mut pending: Vec<usize> = (0..records.len()).collect();
        let mut attempt: u32 = 0;

        while !pending.is_empty() {
            attempt += 1;
            result.attempts = attempt;

            let outcomes = self.attempt(&records, &ids, &pending).await?;

            let mut retry: Vec<(usize, ItemFailure)> = Vec::new();
            for (index, outcome) in pending.iter().copied().zip(outcomes) {
                match outcome {
                    BulkItemOutcome::Indexed => result.succeeded += 1,
                    BulkItemOutcome::Failed(failure) if failure.is_retryable() => {
                        retry.push((index, failure))
                    }
                    BulkItemOutcome::Failed(failure) => permanent.push((index, failure)),
                }
            }

            if retry.is_empty() {
                break;
            }

            if !self.config.retry.allows_retry_after(attempt) {
                warn!(
                    attempt = attempt,
                    remaining = retry.len(),
                    "Retries exhausted, recording failures"
                );
                result.retryable = true;
                permanent.extend(retry);
                break;
            }

            let delay = self.config.retry.delay(attempt);
            if deadline.is_some_and(|deadline| Instant::now() + delay > deadline) {
                warn!(
                    attempt = attempt,
                    remaining = retry.len(),
                    "Deadline reached before retry, recording failures"
                );
                result.retryable = true;
                permanent.extend(retry.into_iter().map(|(index, failure)| {
                    let failure = ItemFailure::retryable(
                        failure.status,
                        failure.error_type,
                        DEADLINE_REASON,
                    );
                    (index, failure)
                }));
                break;
            }

            warn!(
                attempt = attempt,
                max_attempts = self.config.retry.max_attempts,
                retrying = retry.len(),
                delay_ms = delay.as_millis() as u64,
                "Bulk write partially failed, retrying"
            );
            tokio::time::sleep(delay).await;

            pending = retry.into_iter().map(|(index, _)| index).collect();
        }

        permanent.sort_by_key(|(index, _)| *index);
        result.failed = permanent
            .into_iter()
            .map(|(index, failure)| FailedRecord {
                record: records[index].clone(),
                failure,
            })
            .collect();

        if result.failed.is_empty() {
            debug!(
                indexed = result.succeeded,
                attempts = result.attempts,
                "Batch written"
            );
        } else {
            info!(
                indexed = result.succeeded,
                failed = result.failed.len(),
                attempts = result.attempts,
                "Batch written with failures"
            );
        }

        Ok(result)
    }

    /// Send one bulk call for the `pending` records, returning one outcome per
    /// pending record.
    async fn attempt(
        &self,
        records: &[FlowRecord],
        ids: &[Option<String>],
        pending: &[usize],
    ) -> Result<Vec<BulkItemOutcome>, PipelineError> {
        let documents: Vec<BulkDocument<'_>> = pending
            .iter()
            .map(|&index| BulkDocument {
                id: ids[index].as_deref(),
                record: &records[index],
            })
            .collect();

        match self
            .provider
            .bulk_write(&self.config.index_name, &documents)
            .await
        {
            Ok(outcomes) if outcomes.len() == documents.len() => Ok(outcomes),
            Ok(outcomes) => Err(PipelineError::internal(format!(
                "bulk response has {} items for {} documents",
                outcomes.len(),
                documents.len()
            ))),
            Err(BulkWriteError::MalformedResponse(msg)) => Err(PipelineError::internal(format!(
                "malformed bulk response: {}",
                msg
            ))),
            Err(e) => {
                warn!(error = %e, count = documents.len(), "Bulk request failed");
                let failure = e.to_item_failure();
                Ok(vec![BulkItemOutcome::Failed(failure); documents.len()])
            }
        }
    }

    /// Check if the indexing backend is healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        self.provider
            .health_check()
            .await
            .map_err(|e| PipelineError::internal(e.to_string()))
    }
}
