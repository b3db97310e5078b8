//! # Flow-Log Indexer Shared
//!
//! Data types that flow between the stages of the flow-log indexer: object
//! references and trigger events, decoded lines and parsed records, batches,
//! per-batch write results and the per-invocation outcome.

pub mod batch;
pub mod event;
pub mod object;
pub mod outcome;
pub mod record;

pub use batch::Batch;
pub use event::{EventRecord, ObjectCreatedEvent};
pub use object::LogObjectReference;
pub use outcome::{
    FailureKind, FailedRecord, InvocationOutcome, InvocationResponse, InvocationStatus,
    ItemFailure, ObjectStatus, ObjectSummary, WriteFailureSample, WriteResult,
};
pub use record::{FlowRecord, ParseFailure, ParseOutcome, RawLine};
