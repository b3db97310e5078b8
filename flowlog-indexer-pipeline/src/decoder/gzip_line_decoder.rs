//! Streaming gzip line decoder.

use std::io::{BufRead, BufReader};

use bytes::{Buf, Bytes};
use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::debug;

use crate::processor::excerpt;
use flowlog_indexer_shared::RawLine;

/// Errors produced while decoding an object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The compressed stream is truncated or malformed. Ends the sequence.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// One line is not valid UTF-8. Decoding continues with the next line.
    #[error("Line {ordinal} is not valid UTF-8")]
    InvalidUtf8 { ordinal: u64, excerpt: String },
}

/// Lazily decompresses a gzip object and yields its lines.
///
/// Concatenated gzip members are read as one stream. Lines are split on
/// `\n` with a trailing `\r` removed; blank lines are skipped but still
/// advance the ordinal, so ordinals match physical line numbers.
pub struct GzipLineDecoder {
    reader: Option<BufReader<MultiGzDecoder<bytes::buf::Reader<Bytes>>>>,
    buf: Vec<u8>,
    ordinal: u64,
    blank_lines: u64,
}

impl GzipLineDecoder {
    /// Create a decoder over the compressed content of one object.
    ///
    /// A zero-byte object decodes to an empty sequence.
    pub fn new(compressed: Bytes) -> Self {
        let reader = if compressed.is_empty() {
            None
        } else {
            Some(BufReader::new(MultiGzDecoder::new(compressed.reader())))
        };

        Self {
            reader,
            buf: Vec::new(),
            ordinal: 0,
            blank_lines: 0,
        }
    }

    /// Physical lines read so far.
    pub fn lines_read(&self) -> u64 {
        self.ordinal
    }

    /// Blank lines skipped so far.
    pub fn blank_lines(&self) -> u64 {
        self.blank_lines
    }

    fn finish(&mut self) {
        if self.reader.take().is_some() && self.blank_lines > 0 {
            debug!(
                lines = self.ordinal,
                blank_lines = self.blank_lines,
                "Skipped blank lines"
            );
        }
    }
}

impl Iterator for GzipLineDecoder {
    type Item = Result<RawLine, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();

            match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finish();
                    return None;
                }
                Ok(_) => {
                    self.ordinal += 1;

                    if self.buf.last() == Some(&b'\n') {
                        self.buf.pop();
                    }
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                    if self.buf.is_empty() {
                        self.blank_lines += 1;
                        continue;
                    }

                    let line = std::mem::take(&mut self.buf);
                    return Some(match String::from_utf8(line) {
                        Ok(text) => Ok(RawLine::new(self.ordinal, text)),
                        Err(e) => Err(DecodeError::InvalidUtf8 {
                            ordinal: self.ordinal,
                            excerpt: excerpt(&String::from_utf8_lossy(e.as_bytes())),
                        }),
                    });
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(DecodeError::CorruptArchive(e.to_string())));
                }
            }
        }
    }
}
