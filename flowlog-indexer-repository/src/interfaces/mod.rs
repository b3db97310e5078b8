//! Interface definitions for the external collaborators of the pipeline.
//!
//! The pipeline only depends on these traits, so the concrete OpenSearch client
//! and object store adapters can be swapped for substitutes in tests.

mod bulk_index_provider;
mod object_fetcher;

pub use bulk_index_provider::{BulkDocument, BulkIndexProvider, BulkItemOutcome};
pub use object_fetcher::ObjectFetcher;
