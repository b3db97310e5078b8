//! # Flow-Log Indexer Repository
//!
//! This crate provides the traits the pipeline depends on for its two external
//! collaborators, the indexing backend and the object store, together with
//! concrete implementations for OpenSearch and for object store backends
//! (Amazon S3 and the local filesystem).

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod storage;

pub use errors::{BulkWriteError, FetchError};
pub use interfaces::{BulkDocument, BulkIndexProvider, BulkItemOutcome, ObjectFetcher};
pub use crate::opensearch::{
    OpenSearchAuth, OpenSearchClient, OpenSearchConfig, DEFAULT_SIGV4_SERVICE,
};
pub use storage::{ObjectStoreFetcher, S3Options, StoreBackend};
