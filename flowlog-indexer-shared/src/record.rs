//! Decoded lines and parsed flow-log records.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A single decoded text line with its 1-based position in the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub ordinal: u64,
    pub text: String,
}

impl RawLine {
    pub fn new(ordinal: u64, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            text: text.into(),
        }
    }
}

/// One flow event as a field-name to value mapping.
///
/// The mapping is kept exactly as decoded; no field is required or rejected.
/// Serializes as the bare mapping so it can be sent to the index unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    fields: Map<String, Value>,
    ordinal: u64,
    encoded_len: usize,
}

impl FlowRecord {
    /// Wrap a decoded mapping.
    ///
    /// `encoded_len` is the size of the source text in bytes and is used for
    /// byte-bounded batching.
    pub fn new(fields: Map<String, Value>, ordinal: u64, encoded_len: usize) -> Self {
        Self {
            fields,
            ordinal,
            encoded_len,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Line ordinal this record was decoded from.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl Serialize for FlowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A line that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// Ordinal of the offending line.
    pub ordinal: u64,
    /// Bounded prefix of the offending line.
    pub excerpt: String,
    pub reason: String,
}

impl ParseFailure {
    pub fn new(ordinal: u64, excerpt: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ordinal,
            excerpt: excerpt.into(),
            reason: reason.into(),
        }
    }
}

/// Result of parsing one line; malformed input is data, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Record(FlowRecord),
    Failure(ParseFailure),
}

impl ParseOutcome {
    pub fn is_record(&self) -> bool {
        matches!(self, ParseOutcome::Record(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_record_serializes_as_mapping() {
        let fields = json!({
            "srcaddr": "10.0.0.1",
            "dstport": 443,
            "action": "ACCEPT"
        });
        let Value::Object(map) = fields.clone() else {
            panic!("expected object");
        };

        let record = FlowRecord::new(map, 7, 52);

        assert_eq!(serde_json::to_value(&record).unwrap(), fields);
        assert_eq!(record.ordinal(), 7);
        assert_eq!(record.encoded_len(), 52);
        assert_eq!(record.get("dstport"), Some(&json!(443)));
    }
}
