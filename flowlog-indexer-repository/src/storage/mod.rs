//! Object store implementation of the object fetcher.
//!
//! Log objects are addressed by container (bucket) and key. One store is
//! built lazily per container and reused for every object in it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, instrument};

use crate::errors::FetchError;
use crate::interfaces::ObjectFetcher;
use flowlog_indexer_shared::LogObjectReference;

/// Settings for S3 and S3-compatible stores.
///
/// Credentials are taken from the standard `AWS_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub region: Option<String>,
    /// Custom endpoint, e.g. a MinIO or LocalStack URL.
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

/// Where log objects are read from.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    S3(S3Options),
    /// Containers are subdirectories of `root`.
    Local { root: PathBuf },
}

/// Fetches log objects through `object_store`.
pub struct ObjectStoreFetcher {
    backend: StoreBackend,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreFetcher {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Return the store for `container`, building it on first use.
    fn store_for(&self, container: &str) -> Result<Arc<dyn ObjectStore>, FetchError> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| FetchError::unavailable("object store cache poisoned"))?;

        if let Some(store) = stores.get(container) {
            return Ok(Arc::clone(store));
        }

        let store = self.build_store(container)?;
        stores.insert(container.to_string(), Arc::clone(&store));
        debug!(container = %container, "Created object store");
        Ok(store)
    }

    fn build_store(&self, container: &str) -> Result<Arc<dyn ObjectStore>, FetchError> {
        match &self.backend {
            StoreBackend::S3(options) => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(container);

                if let Some(region) = &options.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &options.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                builder = builder.with_allow_http(options.allow_http);

                Ok(Arc::new(builder.build()?))
            }
            StoreBackend::Local { root } => {
                let local_fs = LocalFileSystem::new_with_prefix(root.join(container))?;
                Ok(Arc::new(local_fs))
            }
        }
    }
}

#[async_trait]
impl ObjectFetcher for ObjectStoreFetcher {
    #[instrument(skip(self), fields(object = %object))]
    async fn fetch(&self, object: &LogObjectReference) -> Result<Bytes, FetchError> {
        let store = self.store_for(&object.container)?;
        // Keys are taken verbatim, not percent-encoded
        let location = Path::parse(&object.key)?;

        let bytes = store.get(&location).await?.bytes().await?;
        debug!(bytes = bytes.len(), "Fetched object");

        Ok(bytes)
    }
}
