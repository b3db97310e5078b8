//! Decoder module for the flow-log indexer pipeline.
//!
//! Turns a compressed log object into a lazy sequence of text lines.

mod gzip_line_decoder;

pub use gzip_line_decoder::{DecodeError, GzipLineDecoder};
