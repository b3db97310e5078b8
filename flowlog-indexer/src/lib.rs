//! # Flow-Log Indexer
//!
//! Main library for the flow-log indexer.
//!
//! This crate provides configuration, dependency wiring, logging and the
//! invocation handler used by the `flowlog-indexer` binary.

pub mod config;
pub mod handler;
pub mod logging;

pub use config::{Dependencies, IndexerConfig};
pub use handler::{handle_event, render_response};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid environment configuration.
    #[error(transparent)]
    InvalidConfig(#[from] config::ConfigError),

    /// The trigger event is not a valid notification document.
    #[error("Invalid trigger event: {0}")]
    EventError(#[from] serde_json::Error),

    /// The invocation response could not be serialized.
    #[error("Failed to serialize invocation response: {0}")]
    ResponseError(#[source] serde_json::Error),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] flowlog_indexer_pipeline::PipelineError),

    /// Indexing backend error.
    #[error("Backend error: {0}")]
    BackendError(#[from] flowlog_indexer_repository::BulkWriteError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
