//! Bulk response parsing and per-item failure classification.
//!
//! A `_bulk` response looks like:
//!
//! ```text
//! { "took": 3, "errors": true, "items": [
//!     { "index": { "_id": "..", "status": 201 } },
//!     { "index": { "_id": "..", "status": 400,
//!                  "error": { "type": "mapper_parsing_exception", "reason": ".." } } }
//! ] }
//! ```

use serde_json::Value;

use crate::errors::BulkWriteError;
use crate::interfaces::BulkItemOutcome;
use flowlog_indexer_shared::{FailureKind, ItemFailure};

/// Error types the backend uses when it sheds load.
const REJECTED_EXECUTION_TYPES: &[&str] = &[
    "es_rejected_execution_exception",
    "opensearch_rejected_execution_exception",
    "rejected_execution_exception",
];

/// Item statuses that may succeed on a later attempt.
///
/// 409 is included because documents are written with `index` actions, which
/// overwrite, so a version conflict is resolved by sending the document again.
const RETRYABLE_STATUSES: &[u16] = &[409, 429, 500, 502, 503, 504];

/// Classify a failed bulk item.
pub fn classify_item(status: u16, error_type: &str) -> FailureKind {
    if RETRYABLE_STATUSES.contains(&status) || REJECTED_EXECUTION_TYPES.contains(&error_type) {
        FailureKind::Retryable
    } else {
        FailureKind::Terminal
    }
}

/// Parse the `items` of a bulk response into one outcome per document.
pub fn parse_bulk_response(body: &Value) -> Result<Vec<BulkItemOutcome>, BulkWriteError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| BulkWriteError::malformed("response has no items array"))?;

    items.iter().map(parse_item).collect()
}

fn parse_item(item: &Value) -> Result<BulkItemOutcome, BulkWriteError> {
    // Each item is keyed by its action type ("index", "create", ...)
    let result = item
        .as_object()
        .and_then(|actions| actions.values().next())
        .ok_or_else(|| BulkWriteError::malformed(format!("unexpected bulk item: {}", item)))?;

    let status = result
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| BulkWriteError::malformed(format!("bulk item without status: {}", item)))?;

    let Some(error) = result.get("error") else {
        if (200..300).contains(&status) {
            return Ok(BulkItemOutcome::Indexed);
        }
        let kind = classify_item(status, "");
        return Ok(BulkItemOutcome::Failed(failure(
            kind,
            status,
            "unknown",
            format!("item failed with status {}", status),
        )));
    };

    let (error_type, reason) = match error {
        Value::Object(fields) => (
            fields
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            fields
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        other => ("unknown".to_string(), other.to_string()),
    };

    let kind = classify_item(status, &error_type);
    Ok(BulkItemOutcome::Failed(failure(kind, status, error_type, reason)))
}

fn failure(
    kind: FailureKind,
    status: u16,
    error_type: impl Into<String>,
    reason: impl Into<String>,
) -> ItemFailure {
    match kind {
        FailureKind::Retryable => ItemFailure::retryable(Some(status), error_type, reason),
        FailureKind::Terminal => ItemFailure::terminal(Some(status), error_type, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_response() {
        let body = json!({
            "took": 5,
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201, "result": "created" } },
                { "index": { "_id": "b", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [bytes] of type [long]"
                } } },
                { "index": { "_id": "c", "status": 429, "error": {
                    "type": "es_rejected_execution_exception",
                    "reason": "rejected execution"
                } } },
                { "index": { "_id": "d", "status": 200, "result": "updated" } }
            ]
        });

        let outcomes = parse_bulk_response(&body).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0], BulkItemOutcome::Indexed);
        assert_eq!(outcomes[3], BulkItemOutcome::Indexed);

        match &outcomes[1] {
            BulkItemOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::Terminal);
                assert_eq!(failure.status, Some(400));
                assert_eq!(failure.error_type, "mapper_parsing_exception");
            }
            other => panic!("expected failure, got {:?}", other),
        }

        match &outcomes[2] {
            BulkItemOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Retryable),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_without_items() {
        let result = parse_bulk_response(&json!({ "error": "boom" }));
        assert!(matches!(result, Err(BulkWriteError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_item_without_status() {
        let result = parse_bulk_response(&json!({ "items": [ { "index": { "_id": "a" } } ] }));
        assert!(matches!(result, Err(BulkWriteError::MalformedResponse(_))));
    }

    #[test]
    fn test_classify_item() {
        assert_eq!(classify_item(429, ""), FailureKind::Retryable);
        assert_eq!(classify_item(503, "unavailable_shards_exception"), FailureKind::Retryable);
        assert_eq!(classify_item(409, "version_conflict_engine_exception"), FailureKind::Retryable);
        assert_eq!(
            classify_item(500, "opensearch_rejected_execution_exception"),
            FailureKind::Retryable
        );
        assert_eq!(classify_item(400, "mapper_parsing_exception"), FailureKind::Terminal);
        assert_eq!(classify_item(404, "index_not_found_exception"), FailureKind::Terminal);
    }
}
