//! # Flow-Log Indexer Pipeline
//!
//! This crate provides the pipeline components for ingesting compressed
//! flow-log objects and indexing their records into OpenSearch.
//!
//! ## Architecture
//!
//! Each object of an invocation flows through:
//!
//! 1. **Decoder**: Decompresses the object into lines
//! 2. **Processor**: Parses each line into a flow record or a parse failure
//! 3. **Batcher**: Groups records into bounded batches
//! 4. **Loader**: Writes each batch with one bulk call, retrying failed items
//! 5. **Orchestrator**: Runs the stages per object and aggregates the outcome

pub mod batcher;
pub mod decoder;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub use batcher::{BatchAccumulator, BatchConfig};
pub use decoder::{DecodeError, GzipLineDecoder};
pub use errors::PipelineError;
pub use loader::{IndexWriter, RetryPolicy, WriterConfig};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use processor::RecordParser;
