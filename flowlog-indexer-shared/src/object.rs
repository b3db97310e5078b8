//! Reference to a compressed log object in the object store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one compressed log object to process.
///
/// Created once per notification record and discarded after the object has
/// been processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogObjectReference {
    /// The container (bucket) holding the object.
    pub container: String,
    /// The object key inside the container.
    pub key: String,
    /// Size in bytes as announced by the notification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
}

impl LogObjectReference {
    /// Create a reference without a size hint.
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            size_hint: None,
        }
    }

    /// Attach the announced object size.
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }
}

impl fmt::Display for LogObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}
