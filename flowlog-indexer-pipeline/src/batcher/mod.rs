//! Batcher module for the flow-log indexer pipeline.
//!
//! Groups the records of one object into bounded batches.

use flowlog_indexer_shared::{Batch, FlowRecord, LogObjectReference};

/// Default maximum number of records per batch.
pub const DEFAULT_MAX_RECORDS: usize = 500;

/// Default maximum encoded size of a batch (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the batch accumulator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of records that completes a batch.
    pub max_records: usize,
    /// Encoded size a batch may not exceed; `None` disables the limit.
    pub max_bytes: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_bytes: Some(DEFAULT_MAX_BYTES),
        }
    }
}

/// Accumulates records into batches for a single object.
///
/// A batch is emitted when it reaches `max_records`, or just before a record
/// would push it past `max_bytes`. A record larger than `max_bytes` on its
/// own forms a batch by itself. `finish` emits the final partial batch.
pub struct BatchAccumulator {
    source: LogObjectReference,
    config: BatchConfig,
    pending: Vec<FlowRecord>,
    pending_bytes: usize,
}

impl BatchAccumulator {
    /// Create an accumulator for the records of `source`.
    pub fn new(source: LogObjectReference, config: BatchConfig) -> Self {
        let config = BatchConfig {
            max_records: config.max_records.max(1),
            ..config
        };

        Self {
            source,
            pending: Vec::with_capacity(config.max_records.min(DEFAULT_MAX_RECORDS)),
            pending_bytes: 0,
            config,
        }
    }

    /// Add a record, returning a completed batch if one is ready.
    pub fn push(&mut self, record: FlowRecord) -> Option<Batch> {
        let overflows = self.config.max_bytes.is_some_and(|max_bytes| {
            !self.pending.is_empty() && self.pending_bytes + record.encoded_len() > max_bytes
        });

        if overflows {
            // pending was non-empty, so max_records > 1 and the record
            // starting the next batch cannot complete it
            let ready = self.take();
            self.add(record);
            return ready;
        }

        self.add(record);
        if self.pending.len() >= self.config.max_records {
            return self.take();
        }
        None
    }

    /// Emit the final partial batch, if any record is pending.
    pub fn finish(mut self) -> Option<Batch> {
        self.take()
    }

    /// Records currently waiting for a batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn add(&mut self, record: FlowRecord) {
        self.pending_bytes += record.encoded_len();
        self.pending.push(record);
    }

    fn take(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending_bytes = 0;
        let records = std::mem::take(&mut self.pending);
        Some(Batch::new(self.source.clone(), records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(ordinal: u64, encoded_len: usize) -> FlowRecord {
        FlowRecord::new(Map::new(), ordinal, encoded_len)
    }

    fn source() -> LogObjectReference {
        LogObjectReference::new("flow-logs", "AWSLogs/part-0.gz")
    }

    fn ordinals(batch: &Batch) -> Vec<u64> {
        batch.records().iter().map(FlowRecord::ordinal).collect()
    }

    #[test]
    fn test_batches_by_count() {
        let config = BatchConfig {
            max_records: 3,
            max_bytes: None,
        };
        let mut accumulator = BatchAccumulator::new(source(), config);

        let mut batches = Vec::new();
        for ordinal in 1..=7 {
            batches.extend(accumulator.push(record(ordinal, 100)));
        }
        batches.extend(accumulator.finish());

        assert_eq!(batches.len(), 3);
        assert_eq!(ordinals(&batches[0]), vec![1, 2, 3]);
        assert_eq!(ordinals(&batches[1]), vec![4, 5, 6]);
        assert_eq!(ordinals(&batches[2]), vec![7]);
        assert!(batches.iter().all(|b| b.source() == &source()));
    }

    #[test]
    fn test_batches_by_bytes() {
        let config = BatchConfig {
            max_records: 100,
            max_bytes: Some(250),
        };
        let mut accumulator = BatchAccumulator::new(source(), config);

        let mut batches = Vec::new();
        for ordinal in 1..=5 {
            batches.extend(accumulator.push(record(ordinal, 100)));
        }
        batches.extend(accumulator.finish());

        assert_eq!(batches.len(), 3);
        assert_eq!(ordinals(&batches[0]), vec![1, 2]);
        assert_eq!(batches[0].byte_size(), 200);
        assert_eq!(ordinals(&batches[1]), vec![3, 4]);
        assert_eq!(ordinals(&batches[2]), vec![5]);
    }

    #[test]
    fn test_oversized_record_is_alone() {
        let config = BatchConfig {
            max_records: 100,
            max_bytes: Some(250),
        };
        let mut accumulator = BatchAccumulator::new(source(), config);

        assert!(accumulator.push(record(1, 100)).is_none());
        let first = accumulator.push(record(2, 1000)).unwrap();
        let second = accumulator.push(record(3, 100)).unwrap();
        let last = accumulator.finish().unwrap();

        assert_eq!(ordinals(&first), vec![1]);
        assert_eq!(ordinals(&second), vec![2]);
        assert_eq!(ordinals(&last), vec![3]);
    }

    #[test]
    fn test_no_records_no_batch() {
        let accumulator = BatchAccumulator::new(source(), BatchConfig::default());
        assert!(accumulator.finish().is_none());
    }

    #[test]
    fn test_zero_max_records_is_clamped() {
        let config = BatchConfig {
            max_records: 0,
            max_bytes: None,
        };
        let mut accumulator = BatchAccumulator::new(source(), config);

        let batch = accumulator.push(record(1, 10)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(accumulator.pending(), 0);
    }
}
