//! Bounded group of records handed to the index writer as one bulk request.

use crate::object::LogObjectReference;
use crate::record::FlowRecord;

/// An ordered, non-empty group of records from a single object.
#[derive(Debug, Clone)]
pub struct Batch {
    source: LogObjectReference,
    records: Vec<FlowRecord>,
    byte_size: usize,
}

impl Batch {
    pub fn new(source: LogObjectReference, records: Vec<FlowRecord>) -> Self {
        let byte_size = records.iter().map(FlowRecord::encoded_len).sum();
        Self {
            source,
            records,
            byte_size,
        }
    }

    /// The object the records were decoded from.
    pub fn source(&self) -> &LogObjectReference {
        &self.source
    }

    pub fn records(&self) -> &[FlowRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FlowRecord> {
        self.records
    }

    /// Number of records this batch represents.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of the encoded sizes of the records.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}
