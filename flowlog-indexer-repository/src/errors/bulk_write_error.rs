//! Bulk write error types.
//!
//! Errors that fail a bulk request as a whole. Failures of individual
//! documents inside an accepted request are reported per item instead.

use thiserror::Error;

use flowlog_indexer_shared::ItemFailure;

/// Errors that can occur while sending a bulk request to the indexing backend.
#[derive(Debug, Clone, Error)]
pub enum BulkWriteError {
    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backend rejected the whole request.
    #[error("Bulk request failed with status {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The request body could not be built.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The backend answered with something that is not a bulk response.
    #[error("Malformed bulk response: {0}")]
    MalformedResponse(String),
}

impl BulkWriteError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Whether sending the same request again may succeed.
    ///
    /// Transport failures, throttling and server-side unavailability are
    /// transient; any other rejection of the request is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::HttpError { status, .. } => *status == 429 || *status >= 500,
            Self::SerializationError(_) | Self::MalformedResponse(_) => false,
        }
    }

    /// The failure recorded against every document of the failed request.
    pub fn to_item_failure(&self) -> ItemFailure {
        let (status, error_type) = match self {
            Self::ConnectionError(_) => (None, "connection_error"),
            Self::Timeout(_) => (None, "timeout"),
            Self::HttpError { status, .. } => (Some(*status), "http_error"),
            Self::SerializationError(_) => (None, "serialization_error"),
            Self::MalformedResponse(_) => (None, "malformed_response"),
        };

        if self.is_retryable() {
            ItemFailure::retryable(status, error_type, self.to_string())
        } else {
            ItemFailure::terminal(status, error_type, self.to_string())
        }
    }
}

impl From<opensearch::Error> for BulkWriteError {
    fn from(err: opensearch::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        match err.status_code() {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::ConnectionError(err.to_string()),
        }
    }
}
