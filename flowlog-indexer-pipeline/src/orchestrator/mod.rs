//! Orchestrator module for the flow-log indexer pipeline.
//!
//! Runs decoder, parser, batcher and writer for every object of an
//! invocation and aggregates the outcome.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::batcher::{BatchAccumulator, BatchConfig};
use crate::decoder::{DecodeError, GzipLineDecoder};
use crate::errors::PipelineError;
use crate::loader::IndexWriter;
use crate::processor::RecordParser;
use flowlog_indexer_repository::ObjectFetcher;
use flowlog_indexer_shared::{
    Batch, InvocationOutcome, LogObjectReference, ObjectStatus, ObjectSummary, ParseFailure,
    ParseOutcome,
};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of objects processed at the same time.
    pub object_concurrency: usize,
    /// Objects are not started within this margin of the deadline.
    pub deadline_margin: Duration,
    pub batch: BatchConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            object_concurrency: 4,
            deadline_margin: Duration::from_millis(2000),
            batch: BatchConfig::default(),
        }
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// Objects are independent: a fetch or decode failure is recorded against
/// its object and the others carry on. Per-object summaries are folded into
/// the invocation outcome by the orchestrator alone, in notification order.
pub struct Orchestrator {
    fetcher: Arc<dyn ObjectFetcher>,
    parser: RecordParser,
    writer: IndexWriter,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(fetcher: Arc<dyn ObjectFetcher>, writer: IndexWriter) -> Self {
        Self::with_config(fetcher, writer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        fetcher: Arc<dyn ObjectFetcher>,
        writer: IndexWriter,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            fetcher,
            parser: RecordParser::new(),
            writer,
            config,
        }
    }

    /// The index writer, e.g. for health checks.
    pub fn writer(&self) -> &IndexWriter {
        &self.writer
    }

    /// Run one invocation over `objects`.
    ///
    /// # Arguments
    ///
    /// * `objects` - Object references in notification order
    /// * `deadline` - Platform-imposed end of the invocation, if any
    ///
    /// # Returns
    ///
    /// * `Ok(InvocationOutcome)` - Every object accounted for
    /// * `Err(PipelineError)` - An internal fault aborted the invocation
    #[instrument(skip(self, objects, deadline), fields(objects = objects.len()))]
    pub async fn run(
        &self,
        objects: Vec<LogObjectReference>,
        deadline: Option<Instant>,
    ) -> Result<InvocationOutcome, PipelineError> {
        let mut outcome = InvocationOutcome::new();
        info!(invocation_id = %outcome.invocation_id, "Starting invocation");

        let results = stream::iter(objects.into_iter().enumerate())
            .map(|(position, object)| async move {
                self.process_object(object, deadline)
                    .await
                    .map(|summary| (position, summary))
            })
            .buffer_unordered(self.config.object_concurrency.max(1));

        let mut summaries: Vec<(usize, ObjectSummary)> = match results.try_collect().await {
            Ok(summaries) => summaries,
            Err(e) => {
                error!(invocation_id = %outcome.invocation_id, error = %e, "Invocation aborted");
                return Err(e);
            }
        };

        summaries.sort_by_key(|(position, _)| *position);
        for (_, summary) in summaries {
            outcome.absorb(summary);
        }
        let outcome = outcome.finish();

        info!(
            invocation_id = %outcome.invocation_id,
            status = ?outcome.status,
            objects = outcome.objects_total,
            objects_failed = outcome.objects_failed,
            records_seen = outcome.records_seen,
            indexed = outcome.indexed,
            parse_failed = outcome.parse_failed,
            write_failed = outcome.write_failed,
            "Invocation finished"
        );

        Ok(outcome)
    }

    /// Fetch, decode, parse and write a single object.
    #[instrument(skip(self, object, deadline), fields(object = %object))]
    async fn process_object(
        &self,
        object: LogObjectReference,
        deadline: Option<Instant>,
    ) -> Result<ObjectSummary, PipelineError> {
        if let Some(deadline) = deadline {
            if Instant::now() + self.config.deadline_margin >= deadline {
                warn!("Deadline reached, object not started");
                return Ok(ObjectSummary::with_status(
                    object,
                    ObjectStatus::Skipped("deadline reached before start".to_string()),
                ));
            }
        }

        let compressed = match self.fetcher.fetch(&object).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to fetch object");
                return Ok(ObjectSummary::with_status(
                    object,
                    ObjectStatus::FetchFailed(e.to_string()),
                ));
            }
        };

        let mut summary = ObjectSummary::new(object.clone());
        let mut accumulator = BatchAccumulator::new(object, self.config.batch.clone());
        let mut corruption = None;

        for line in GzipLineDecoder::new(compressed) {
            match line {
                Ok(raw) => match self.parser.parse(&raw) {
                    ParseOutcome::Record(record) => {
                        summary.record_parsed();
                        if let Some(batch) = accumulator.push(record) {
                            self.write_batch(batch, deadline, &mut summary).await?;
                        }
                    }
                    ParseOutcome::Failure(failure) => {
                        debug!(
                            ordinal = failure.ordinal,
                            reason = %failure.reason,
                            "Skipping malformed line"
                        );
                        summary.record_parse_failure(failure);
                    }
                },
                Err(DecodeError::InvalidUtf8 { ordinal, excerpt }) => {
                    debug!(ordinal = ordinal, "Skipping line that is not valid UTF-8");
                    summary.record_parse_failure(ParseFailure::new(
                        ordinal,
                        excerpt,
                        "invalid UTF-8",
                    ));
                }
                Err(DecodeError::CorruptArchive(reason)) => {
                    corruption = Some(reason);
                    break;
                }
            }
        }

        // Records decoded before a corruption are still written
        if let Some(batch) = accumulator.finish() {
            self.write_batch(batch, deadline, &mut summary).await?;
        }

        if let Some(reason) = corruption {
            error!(
                reason = %reason,
                records_seen = summary.records_seen,
                "Object is a corrupt archive"
            );
            summary.status = ObjectStatus::CorruptArchive(reason);
        } else {
            info!(
                records_seen = summary.records_seen,
                indexed = summary.indexed,
                parse_failed = summary.parse_failed,
                write_failed = summary.write_failed,
                batches = summary.batches,
                "Object processed"
            );
        }

        Ok(summary)
    }

    async fn write_batch(
        &self,
        batch: Batch,
        deadline: Option<Instant>,
        summary: &mut ObjectSummary,
    ) -> Result<(), PipelineError> {
        let result = self.writer.write(batch, deadline).await?;
        summary.record_write(&result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{mapping_error, throttled, ScriptedProvider};
    use crate::loader::WriterConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use flowlog_indexer_repository::{BulkItemOutcome, FetchError};
    use flowlog_indexer_shared::InvocationStatus;
    use std::collections::HashMap;
    use std::io::Write;

    /// Object fetcher serving objects from memory.
    struct InMemoryFetcher {
        objects: HashMap<String, Bytes>,
    }

    impl InMemoryFetcher {
        fn new() -> Self {
            Self {
                objects: HashMap::new(),
            }
        }

        fn with_object(mut self, key: &str, content: impl Into<Bytes>) -> Self {
            self.objects.insert(key.to_string(), content.into());
            self
        }
    }

    #[async_trait]
    impl ObjectFetcher for InMemoryFetcher {
        async fn fetch(&self, object: &LogObjectReference) -> Result<Bytes, FetchError> {
            self.objects
                .get(&object.key)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(object.key.clone()))
        }
    }

    fn gzip(content: &str) -> Vec<u8> {
        gzip_bytes(content.as_bytes())
    }

    fn gzip_bytes(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    fn flow_lines(count: usize) -> String {
        (0..count)
            .map(|i| {
                format!(
                    "{{\"srcaddr\":\"10.0.0.{}\",\"dstport\":443,\"protocol\":6,\"bytes\":{},\"action\":\"ACCEPT\"}}\n",
                    i % 255,
                    i * 10
                )
            })
            .collect()
    }

    fn reference(key: &str) -> LogObjectReference {
        LogObjectReference::new("flow-logs", key)
    }

    fn orchestrator(fetcher: InMemoryFetcher, provider: Arc<ScriptedProvider>) -> Orchestrator {
        Orchestrator::new(Arc::new(fetcher), IndexWriter::new(provider))
    }

    #[tokio::test]
    async fn test_all_well_formed_lines_are_indexed() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(1234)));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider.clone());

        let outcome = orchestrator.run(vec![reference("a.gz")], None).await.unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.records_seen, 1234);
        assert_eq!(outcome.indexed, 1234);
        assert!(outcome.is_consistent());
        assert!(outcome.finished_at.is_some());
        // 500 + 500 + 234
        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.objects[0].batches, 3);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted() {
        let mut content = flow_lines(40);
        content.push_str("not json at all\n");
        content.push_str("[1,2,3]\n");
        content.push_str("{\"truncated\": \n");
        content.push_str(&flow_lines(10));
        let fetcher = InMemoryFetcher::new().with_object("mixed.gz", gzip(&content));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider);

        let outcome = orchestrator
            .run(vec![reference("mixed.gz")], None)
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.parse_failed, 3);
        assert_eq!(outcome.indexed + outcome.write_failed, 50);
        assert!(outcome.is_consistent());

        let samples = &outcome.objects[0].parse_failure_samples;
        let ordinals: Vec<u64> = samples.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![41, 42, 43]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_a_parse_failure() {
        let mut content = b"{\"srcaddr\":\"10.0.0.1\"}\n".to_vec();
        content.extend_from_slice(b"{\"srcaddr\":\"\xff\xfe\"}\n");
        content.extend_from_slice(b"{\"srcaddr\":\"10.0.0.3\"}\n");
        let fetcher = InMemoryFetcher::new().with_object("latin1.gz", gzip_bytes(&content));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider.clone());

        let outcome = orchestrator
            .run(vec![reference("latin1.gz")], None)
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.records_seen, 3);
        assert_eq!(outcome.indexed, 2);
        assert_eq!(outcome.parse_failed, 1);
        assert!(outcome.is_consistent());

        let samples = &outcome.objects[0].parse_failure_samples;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].ordinal, 2);
        assert_eq!(samples[0].reason, "invalid UTF-8");
        assert_eq!(provider.requested_ordinals().await, vec![vec![1, 3]]);
    }

    #[tokio::test]
    async fn test_partial_write_failure_still_succeeds() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(500)));
        let provider = Arc::new(ScriptedProvider::new(|_, docs| {
            Ok(docs
                .iter()
                .map(|doc| match doc.record.ordinal() {
                    3 | 100 | 400 => mapping_error(),
                    _ => BulkItemOutcome::Indexed,
                })
                .collect())
        }));
        let orchestrator = orchestrator(fetcher, provider.clone());

        let outcome = orchestrator.run(vec![reference("a.gz")], None).await.unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.indexed, 497);
        assert_eq!(outcome.write_failed, 3);
        assert_eq!(outcome.objects[0].write_failure_samples.len(), 3);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_batch_is_indexed_after_retries() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(20)));
        let provider = Arc::new(ScriptedProvider::new(|call, docs| {
            Ok(docs
                .iter()
                .map(|doc| {
                    if call < 2 && doc.record.ordinal() % 2 == 0 {
                        throttled()
                    } else {
                        BulkItemOutcome::Indexed
                    }
                })
                .collect())
        }));
        let orchestrator = orchestrator(fetcher, provider.clone());

        let outcome = orchestrator.run(vec![reference("a.gz")], None).await.unwrap();

        assert_eq!(outcome.indexed, 20);
        assert_eq!(outcome.write_failed, 0);

        let requests = provider.requested_ordinals().await;
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].len(), 20);
        // only the throttled half is resent
        assert!(requests[1].iter().all(|ordinal| ordinal % 2 == 0));
        assert_eq!(requests[1], requests[2]);
    }

    #[tokio::test]
    async fn test_corrupt_object_is_isolated() {
        let fetcher = InMemoryFetcher::new()
            .with_object("first.gz", gzip(&flow_lines(10)))
            .with_object("corrupt.gz", b"this is not a gzip stream".to_vec())
            .with_object("third.gz", gzip(&flow_lines(5)));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider);

        let outcome = orchestrator
            .run(
                vec![
                    reference("first.gz"),
                    reference("corrupt.gz"),
                    reference("third.gz"),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.objects_total, 3);
        assert_eq!(outcome.objects_failed, 1);
        assert_eq!(outcome.indexed, 15);
        assert!(matches!(
            outcome.objects[1].status,
            ObjectStatus::CorruptArchive(_)
        ));
        assert_eq!(outcome.objects[0].status, ObjectStatus::Completed);
        assert_eq!(outcome.objects[2].status, ObjectStatus::Completed);
    }

    #[tokio::test]
    async fn test_truncated_object_accounts_for_decoded_records() {
        let mut compressed = gzip(&flow_lines(3000));
        compressed.truncate(compressed.len() - 16);
        let fetcher = InMemoryFetcher::new().with_object("truncated.gz", compressed);
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider);

        let outcome = orchestrator
            .run(vec![reference("truncated.gz")], None)
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert!(matches!(
            outcome.objects[0].status,
            ObjectStatus::CorruptArchive(_)
        ));
        assert_eq!(outcome.indexed, outcome.records_seen);
        assert!(outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_empty_object_never_writes() {
        let fetcher = InMemoryFetcher::new()
            .with_object("empty.gz", gzip(""))
            .with_object("zero-bytes.gz", Vec::new())
            .with_object("blank.gz", gzip("\n\r\n\n"));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider.clone());

        let outcome = orchestrator
            .run(
                vec![
                    reference("empty.gz"),
                    reference("zero-bytes.gz"),
                    reference("blank.gz"),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.records_seen, 0);
        assert!(outcome.objects.iter().all(|o| o.batches == 0));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_invocation() {
        let fetcher = InMemoryFetcher::new()
            .with_object("a.gz", gzip(&flow_lines(3)))
            .with_object("c.gz", gzip(&flow_lines(4)));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider);

        let outcome = orchestrator
            .run(
                vec![reference("a.gz"), reference("missing.gz"), reference("c.gz")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Failed);
        assert_eq!(outcome.objects_failed, 1);
        // the other objects are still processed
        assert_eq!(outcome.indexed, 7);
        assert!(matches!(
            outcome.objects[1].status,
            ObjectStatus::FetchFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_summaries_keep_notification_order() {
        let keys: Vec<String> = (0..12).map(|i| format!("part-{:02}.gz", i)).collect();
        let fetcher = keys.iter().enumerate().fold(InMemoryFetcher::new(), |f, (i, key)| {
            f.with_object(key, gzip(&flow_lines(i + 1)))
        });
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider);

        let outcome = orchestrator
            .run(keys.iter().map(|key| reference(key)).collect(), None)
            .await
            .unwrap();

        let order: Vec<&str> = outcome
            .objects
            .iter()
            .map(|summary| summary.object.key.as_str())
            .collect();
        assert_eq!(order, keys.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(outcome.indexed, (1..=12).sum::<u64>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_objects_past_deadline_are_skipped() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(3)));
        let provider = Arc::new(ScriptedProvider::accepting());
        let orchestrator = orchestrator(fetcher, provider.clone());
        let deadline = Instant::now() + Duration::from_millis(500);

        let outcome = orchestrator
            .run(vec![reference("a.gz")], Some(deadline))
            .await
            .unwrap();

        assert_eq!(outcome.status, InvocationStatus::Failed);
        assert!(matches!(outcome.objects[0].status, ObjectStatus::Skipped(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_internal_fault_aborts_invocation() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(3)));
        let provider = Arc::new(ScriptedProvider::new(|_, _| Ok(Vec::new())));
        let orchestrator = orchestrator(fetcher, provider);

        let result = orchestrator.run(vec![reference("a.gz")], None).await;
        assert!(matches!(result, Err(PipelineError::InternalFault(_))));
    }

    #[tokio::test]
    async fn test_no_objects() {
        let orchestrator = orchestrator(
            InMemoryFetcher::new(),
            Arc::new(ScriptedProvider::accepting()),
        );

        let outcome = orchestrator.run(Vec::new(), None).await.unwrap();
        assert_eq!(outcome.status, InvocationStatus::Succeeded);
        assert_eq!(outcome.objects_total, 0);
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let fetcher = InMemoryFetcher::new().with_object("a.gz", gzip(&flow_lines(25)));
        let provider = Arc::new(ScriptedProvider::accepting());
        let config = OrchestratorConfig {
            batch: BatchConfig {
                max_records: 10,
                max_bytes: None,
            },
            ..OrchestratorConfig::default()
        };
        let writer = IndexWriter::with_config(provider.clone(), WriterConfig::default());
        let orchestrator = Orchestrator::with_config(Arc::new(fetcher), writer, config);

        let outcome = orchestrator.run(vec![reference("a.gz")], None).await.unwrap();

        assert_eq!(outcome.indexed, 25);
        assert_eq!(provider.call_count(), 3);
    }
}
