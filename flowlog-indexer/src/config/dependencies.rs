//! Dependency initialization and wiring for the flow-log indexer.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::IndexerConfig;
use crate::IndexingError;
use flowlog_indexer_pipeline::{IndexWriter, Orchestrator};
use flowlog_indexer_repository::{
    BulkIndexProvider, ObjectFetcher, ObjectStoreFetcher, OpenSearchClient, StoreBackend,
};

/// Process-wide dependencies, initialised once and never mutated.
static DEPENDENCIES: OnceCell<Dependencies> = OnceCell::const_new();

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// The authenticated backend client shared by every invocation.
    pub index_provider: Arc<dyn BulkIndexProvider>,
}

impl Dependencies {
    /// Build all dependencies from `config`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the backend client cannot be created
    pub async fn new(config: &IndexerConfig) -> Result<Self, IndexingError> {
        let store = match config.store {
            StoreBackend::S3(_) => "s3",
            StoreBackend::Local { .. } => "local",
        };
        info!(
            opensearch_url = %config.opensearch.url,
            index = %config.writer.index_name,
            store = store,
            auth = config.opensearch.auth.kind(),
            "Initializing dependencies"
        );

        let index_provider: Arc<dyn BulkIndexProvider> = Arc::new(
            OpenSearchClient::new(config.opensearch.clone())
                .await
                .map_err(|e| {
                    IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
                })?,
        );

        let fetcher: Arc<dyn ObjectFetcher> =
            Arc::new(ObjectStoreFetcher::new(config.store.clone()));

        let writer = IndexWriter::with_config(index_provider.clone(), config.writer.clone());

        let orchestrator =
            Orchestrator::with_config(fetcher, writer, config.orchestrator.clone());

        Ok(Self {
            orchestrator,
            index_provider,
        })
    }

    /// Return the process-wide dependencies, building them on first use.
    ///
    /// Later calls return the same instance; `config` is only read once.
    pub async fn init(config: &IndexerConfig) -> Result<&'static Dependencies, IndexingError> {
        DEPENDENCIES
            .get_or_try_init(|| Self::new(config))
            .await
    }
}
