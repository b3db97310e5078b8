//! Object-created notification document.
//!
//! The trigger for one invocation is the notification the object store emits
//! when new log objects land: a `Records` array where each record names a
//! bucket and an (URL-encoded) object key.

use serde::Deserialize;

use crate::object::LogObjectReference;

/// Event name prefix for notifications that announce a new object.
const OBJECT_CREATED_PREFIX: &str = "ObjectCreated";

/// A notification carrying one or more object records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// One record of a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ObjectCreatedEvent {
    /// Parse a notification document.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Object references announced by this event, in notification order.
    ///
    /// Records whose event name is present but is not an object-created event
    /// are left out; callers can compare lengths to log what was skipped.
    pub fn object_references(&self) -> Vec<LogObjectReference> {
        self.records
            .iter()
            .filter(|record| record.is_object_created())
            .map(EventRecord::object_reference)
            .collect()
    }
}

impl EventRecord {
    /// Whether this record announces a newly created object.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .map_or(true, |name| name.starts_with(OBJECT_CREATED_PREFIX))
    }

    /// The object this record refers to, with the key URL-decoded.
    pub fn object_reference(&self) -> LogObjectReference {
        let reference = LogObjectReference::new(
            self.s3.bucket.name.clone(),
            decode_object_key(&self.s3.object.key),
        );
        match self.s3.object.size {
            Some(size) => reference.with_size_hint(size),
            None => reference,
        }
    }
}

/// Decode a notification object key (`+` for space, `%XX` escapes).
///
/// Keys whose escapes do not decode to UTF-8 are returned unchanged.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
