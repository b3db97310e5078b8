//! Processor module for the flow-log indexer pipeline.
//!
//! Transforms decoded lines into flow records.

mod record_parser;

pub use record_parser::{excerpt, RecordParser, MAX_EXCERPT_CHARS};
