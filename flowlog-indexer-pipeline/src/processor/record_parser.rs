//! Record parser implementation.
//!
//! Parses one JSON document per line into a `FlowRecord`.

use serde_json::Value;

use flowlog_indexer_shared::{FlowRecord, ParseFailure, ParseOutcome, RawLine};

/// Maximum number of characters of an offending line kept in a failure.
pub const MAX_EXCERPT_CHARS: usize = 256;

/// Bound `text` to [`MAX_EXCERPT_CHARS`] characters, marking truncation.
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Parser that turns raw lines into flow records.
///
/// The decoded mapping is passed through unchanged: no flow-log field is
/// required, renamed or validated. Parsing never fails; malformed input is
/// returned as a `ParseOutcome::Failure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordParser;

impl RecordParser {
    /// Create a new record parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line.
    ///
    /// # Arguments
    ///
    /// * `line` - The decoded line
    ///
    /// # Returns
    ///
    /// `ParseOutcome::Record` for a JSON object, `ParseOutcome::Failure` for
    /// invalid syntax or any other JSON value.
    pub fn parse(&self, line: &RawLine) -> ParseOutcome {
        match serde_json::from_str::<Value>(&line.text) {
            Ok(Value::Object(fields)) => {
                ParseOutcome::Record(FlowRecord::new(fields, line.ordinal, line.text.len()))
            }
            Ok(other) => ParseOutcome::Failure(ParseFailure::new(
                line.ordinal,
                excerpt(&line.text),
                format!("expected a JSON object, found {}", value_kind(&other)),
            )),
            Err(e) => ParseOutcome::Failure(ParseFailure::new(
                line.ordinal,
                excerpt(&line.text),
                format!("invalid JSON: {}", e),
            )),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
