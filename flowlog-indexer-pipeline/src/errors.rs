//! Error types for the flow-log indexer pipeline.
//!
//! Record- and object-level failures are folded into counts and never
//! surface here. A `PipelineError` aborts the invocation.

use thiserror::Error;

/// Errors that abort an invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An unexpected condition outside the classified failure paths.
    #[error("Internal fault: {0}")]
    InternalFault(String),

    /// The pipeline was configured with unusable settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    /// Create an internal fault.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalFault(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
