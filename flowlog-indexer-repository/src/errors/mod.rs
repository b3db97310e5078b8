//! Error types for the flow-log indexer repository.

mod bulk_write_error;
mod fetch_error;

pub use bulk_write_error::BulkWriteError;
pub use fetch_error::FetchError;
