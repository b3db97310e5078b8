//! Write results and invocation outcomes.
//!
//! Counters here are the accounting of the pipeline: every record seen ends up
//! in exactly one of `indexed`, `parse_failed` or `write_failed`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::object::LogObjectReference;
use crate::record::{FlowRecord, ParseFailure};

/// Maximum number of failure samples kept per object.
pub const MAX_FAILURE_SAMPLES: usize = 10;

/// Whether a failed write could succeed on a later attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Retryable,
    Terminal,
}

/// Why the backend did not accept one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// HTTP-style status reported for the item, when there is one.
    pub status: Option<u16>,
    /// Backend error type, e.g. `mapper_parsing_exception`.
    pub error_type: String,
    pub reason: String,
    pub kind: FailureKind,
}

impl ItemFailure {
    pub fn retryable(
        status: Option<u16>,
        error_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            reason: reason.into(),
            kind: FailureKind::Retryable,
        }
    }

    pub fn terminal(
        status: Option<u16>,
        error_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            reason: reason.into(),
            kind: FailureKind::Terminal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }
}

/// A record the backend permanently refused, with the last failure seen.
#[derive(Debug, Clone)]
pub struct FailedRecord {
    pub record: FlowRecord,
    pub failure: ItemFailure,
}

/// Outcome of writing one batch.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Records accepted by the backend.
    pub succeeded: usize,
    /// Records permanently failed.
    pub failed: Vec<FailedRecord>,
    /// True when at least one permanent failure was retryable in kind,
    /// i.e. it failed because attempts ran out.
    pub retryable: bool,
    /// Bulk calls made for this batch.
    pub attempts: u32,
}

impl WriteResult {
    /// Total records this result accounts for.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How processing of one object ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Decoded to the end and every batch write was attempted.
    Completed,
    /// The object could not be fetched.
    FetchFailed(String),
    /// The compressed stream was truncated or malformed.
    CorruptArchive(String),
    /// Not started because the invocation deadline was reached.
    Skipped(String),
}

impl ObjectStatus {
    /// Whether this status fails the invocation.
    pub fn fails_invocation(&self) -> bool {
        matches!(self, ObjectStatus::FetchFailed(_) | ObjectStatus::Skipped(_))
    }
}

/// Sample of a permanently failed record, kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct WriteFailureSample {
    pub ordinal: u64,
    pub failure: ItemFailure,
}

/// Per-object counters and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub object: LogObjectReference,
    #[serde(flatten)]
    pub status: ObjectStatus,
    pub records_seen: u64,
    pub indexed: u64,
    pub parse_failed: u64,
    pub write_failed: u64,
    pub batches: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parse_failure_samples: Vec<ParseFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub write_failure_samples: Vec<WriteFailureSample>,
}

impl ObjectSummary {
    pub fn new(object: LogObjectReference) -> Self {
        Self {
            object,
            status: ObjectStatus::Completed,
            records_seen: 0,
            indexed: 0,
            parse_failed: 0,
            write_failed: 0,
            batches: 0,
            parse_failure_samples: Vec::new(),
            write_failure_samples: Vec::new(),
        }
    }

    /// Summary for an object that never produced any line.
    pub fn with_status(object: LogObjectReference, status: ObjectStatus) -> Self {
        let mut summary = Self::new(object);
        summary.status = status;
        summary
    }

    /// Count one line that produced a record.
    pub fn record_parsed(&mut self) {
        self.records_seen += 1;
    }

    /// Count one line that failed to parse.
    pub fn record_parse_failure(&mut self, failure: ParseFailure) {
        self.records_seen += 1;
        self.parse_failed += 1;
        if self.parse_failure_samples.len() < MAX_FAILURE_SAMPLES {
            self.parse_failure_samples.push(failure);
        }
    }

    /// Fold one batch write into the counters.
    pub fn record_write(&mut self, result: &WriteResult) {
        self.batches += 1;
        self.indexed += result.succeeded as u64;
        self.write_failed += result.failed.len() as u64;
        for failed in &result.failed {
            if self.write_failure_samples.len() >= MAX_FAILURE_SAMPLES {
                break;
            }
            self.write_failure_samples.push(WriteFailureSample {
                ordinal: failed.record.ordinal(),
                failure: failed.failure.clone(),
            });
        }
    }

    /// records seen == indexed + parse failed + write failed
    pub fn is_consistent(&self) -> bool {
        self.records_seen == self.indexed + self.parse_failed + self.write_failed
    }
}

/// Final status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Succeeded,
    Failed,
}

/// Aggregate over every object of one triggering event.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationOutcome {
    pub invocation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: InvocationStatus,
    pub objects_total: u64,
    pub objects_failed: u64,
    pub records_seen: u64,
    pub indexed: u64,
    pub parse_failed: u64,
    pub write_failed: u64,
    pub objects: Vec<ObjectSummary>,
}

impl InvocationOutcome {
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            status: InvocationStatus::Succeeded,
            objects_total: 0,
            objects_failed: 0,
            records_seen: 0,
            indexed: 0,
            parse_failed: 0,
            write_failed: 0,
            objects: Vec::new(),
        }
    }

    /// Fold one object's summary into the totals.
    pub fn absorb(&mut self, summary: ObjectSummary) {
        self.objects_total += 1;
        if summary.status != ObjectStatus::Completed {
            self.objects_failed += 1;
        }
        if summary.status.fails_invocation() {
            self.status = InvocationStatus::Failed;
        }
        self.records_seen += summary.records_seen;
        self.indexed += summary.indexed;
        self.parse_failed += summary.parse_failed;
        self.write_failed += summary.write_failed;
        self.objects.push(summary);
    }

    /// Stamp the finish time.
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }

    /// records seen == indexed + parse failed + write failed
    pub fn is_consistent(&self) -> bool {
        self.records_seen == self.indexed + self.parse_failed + self.write_failed
    }
}

impl Default for InvocationOutcome {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result handed back to the triggering platform.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<InvocationOutcome>,
}

impl InvocationResponse {
    pub fn from_outcome(outcome: InvocationOutcome) -> Self {
        let (status_code, message) = if outcome.is_success() {
            (
                200,
                format!(
                    "Flow logs processed: {} indexed, {} parse failures, {} write failures",
                    outcome.indexed, outcome.parse_failed, outcome.write_failed
                ),
            )
        } else {
            (
                500,
                format!(
                    "{} of {} objects could not be processed",
                    outcome.objects_failed, outcome.objects_total
                ),
            )
        };

        Self {
            status_code,
            message,
            outcome: Some(outcome),
        }
    }

    /// Response for a fault outside the classified failure paths.
    pub fn internal_fault(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            message: message.into(),
            outcome: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
