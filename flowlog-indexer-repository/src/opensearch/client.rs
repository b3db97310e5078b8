//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `BulkIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use opensearch::{
    auth::Credentials,
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::BulkWriteError;
use crate::interfaces::{BulkDocument, BulkIndexProvider, BulkItemOutcome};
use crate::opensearch::config::{OpenSearchAuth, OpenSearchConfig};
use crate::opensearch::response::parse_bulk_response;

/// OpenSearch client implementation.
///
/// Sends every batch as a single `_bulk` request of `index` actions.
///
/// # Example
///
/// ```ignore
/// use flowlog_indexer_repository::OpenSearchConfig;
/// let config = OpenSearchConfig::new("https://search.example.com:443")
///     .with_basic_auth("indexer", "secret");
/// let client = OpenSearchClient::new(config).await?;
///
/// let outcomes = client.bulk_write("vpc-flow-logs", &documents).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client.
    ///
    /// For SigV4 the AWS credential provider chain is resolved here; the
    /// credentials themselves are loaded lazily on the first signed request.
    ///
    /// # Arguments
    ///
    /// * `config` - Cluster URL, authentication and request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(BulkWriteError)` - If the URL is invalid or transport setup fails
    pub async fn new(config: OpenSearchConfig) -> Result<Self, BulkWriteError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| BulkWriteError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout);

        match &config.auth {
            OpenSearchAuth::None => {}
            OpenSearchAuth::Basic { username, password } => {
                builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
            }
            OpenSearchAuth::AwsSigV4 { region, service } => {
                let region = Region::new(region.clone());
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load()
                    .await;
                let provider = sdk_config.credentials_provider().ok_or_else(|| {
                    BulkWriteError::connection("no AWS credentials provider configured")
                })?;

                builder = builder
                    .auth(Credentials::AwsSigV4(provider, region))
                    .service_name(service.as_str());
            }
        }

        let transport = builder
            .build()
            .map_err(|e| BulkWriteError::connection(e.to_string()))?;

        info!(
            url = %config.url,
            auth = config.auth.kind(),
            timeout_secs = config.request_timeout.as_secs(),
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }
}

/// Build the NDJSON lines of a bulk request: one action line and one source
/// line per document.
fn bulk_body(index: &str, documents: &[BulkDocument<'_>]) -> Result<Vec<Value>, BulkWriteError> {
    let mut body = Vec::with_capacity(documents.len() * 2);

    for doc in documents {
        let action = match doc.id {
            Some(id) => json!({ "index": { "_index": index, "_id": id } }),
            None => json!({ "index": { "_index": index } }),
        };
        body.push(action);
        body.push(
            serde_json::to_value(doc.record)
                .map_err(|e| BulkWriteError::SerializationError(e.to_string()))?,
        );
    }

    Ok(body)
}

#[async_trait]
impl BulkIndexProvider for OpenSearchClient {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_write(
        &self,
        index: &str,
        documents: &[BulkDocument<'_>],
    ) -> Result<Vec<BulkItemOutcome>, BulkWriteError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<JsonBody<Value>> = bulk_body(index, documents)?
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(BulkWriteError::http(status.as_u16(), error_body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BulkWriteError::malformed(e.to_string()))?;

        let outcomes = parse_bulk_response(&body)?;
        debug!(
            items = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_indexed()).count(),
            "Bulk request completed"
        );

        Ok(outcomes)
    }

    async fn health_check(&self) -> Result<bool, BulkWriteError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| BulkWriteError::malformed(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        info!(status = %status, "OpenSearch cluster status");
        if status == "red" {
            warn!("OpenSearch cluster is red");
        }

        Ok(status == "green" || status == "yellow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_indexer_shared::FlowRecord;

    fn record(ordinal: u64) -> FlowRecord {
        let fields = json!({ "srcaddr": "10.0.0.1", "bytes": 840 });
        let encoded_len = fields.to_string().len();
        match fields {
            Value::Object(map) => FlowRecord::new(map, ordinal, encoded_len),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bulk_body_pairs_action_and_source() {
        let first = record(1);
        let second = record(2);
        let documents = [
            BulkDocument {
                id: Some("doc-1"),
                record: &first,
            },
            BulkDocument {
                id: None,
                record: &second,
            },
        ];

        let body = bulk_body("vpc-flow-logs", &documents).unwrap();
        assert_eq!(body.len(), 4);
        assert_eq!(
            body[0],
            json!({ "index": { "_index": "vpc-flow-logs", "_id": "doc-1" } })
        );
        assert_eq!(body[1], json!({ "srcaddr": "10.0.0.1", "bytes": 840 }));
        assert_eq!(body[2], json!({ "index": { "_index": "vpc-flow-logs" } }));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_url() {
        let result = OpenSearchClient::new(OpenSearchConfig::new("not a url")).await;
        assert!(matches!(result, Err(BulkWriteError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_new_with_sigv4_signing() {
        let config = OpenSearchConfig::new("https://search-flowlogs.us-east-1.es.amazonaws.com")
            .with_aws_sigv4("us-east-1", "es");

        let result = OpenSearchClient::new(config).await;
        assert!(result.is_ok());
    }
}
