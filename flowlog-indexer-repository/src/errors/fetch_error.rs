//! Object fetch error types.

use thiserror::Error;

/// Errors that can occur while fetching a log object.
///
/// Every variant is terminal for the object it concerns.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The caller may not read the object.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other failure talking to the object store.
    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<object_store::Error> for FetchError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Self::NotFound(path),
            object_store::Error::PermissionDenied { path, .. }
            | object_store::Error::Unauthenticated { path, .. } => Self::AccessDenied(path),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<object_store::path::Error> for FetchError {
    fn from(err: object_store::path::Error) -> Self {
        Self::NotFound(format!("invalid object key: {}", err))
    }
}
