//! Configuration for the flow-log indexer.
//!
//! Everything is read from environment variables. Parsing goes through a
//! lookup function so it can be exercised without touching the process
//! environment.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use flowlog_indexer_pipeline::{BatchConfig, OrchestratorConfig, RetryPolicy, WriterConfig};
use flowlog_indexer_repository::{
    OpenSearchConfig, S3Options, StoreBackend, DEFAULT_SIGV4_SERVICE,
};

/// Default target index.
const DEFAULT_INDEX_NAME: &str = "vpc-flow-logs";

/// Default request timeout in seconds.
const DEFAULT_OPENSEARCH_TIMEOUT_SECS: u64 = 30;

/// Default number of records per batch.
const DEFAULT_BATCH_MAX_RECORDS: usize = 500;

/// Default batch size limit in bytes (5 MiB).
const DEFAULT_BATCH_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Default number of bulk calls per item.
const DEFAULT_WRITE_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 100;

const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Default number of objects processed concurrently.
const DEFAULT_OBJECT_CONCURRENCY: usize = 4;

/// Default safety margin before the invocation deadline.
const DEFAULT_DEADLINE_MARGIN_MS: u64 = 2000;

/// Errors found while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(String),

    /// A variable is set to an unusable value.
    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid(name: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Complete indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch: OpenSearchConfig,
    pub writer: WriterConfig,
    pub orchestrator: OrchestratorConfig,
    pub store: StoreBackend,
    /// Time an invocation may run before its deadline.
    pub invocation_timeout: Option<Duration>,
    pub log_format: LogFormat,
}

impl IndexerConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL` or `OPENSEARCH_ENDPOINT`: backend URL (required)
    /// - `OPENSEARCH_AUTH`: `none`, `basic` or `sigv4` (default: basic when
    ///   credentials are set, otherwise none)
    /// - `OPENSEARCH_USERNAME`, `OPENSEARCH_PASSWORD`: basic auth credentials
    /// - `OPENSEARCH_AWS_REGION` (falls back to `AWS_REGION`),
    ///   `OPENSEARCH_AWS_SERVICE`: SigV4 signing scope (service default: es)
    /// - `OPENSEARCH_TIMEOUT_SECS`: request timeout (default: 30)
    /// - `INDEX_NAME`: target index (default: vpc-flow-logs)
    /// - `BATCH_MAX_RECORDS`: records per batch (default: 500)
    /// - `BATCH_MAX_BYTES`: bytes per batch, 0 disables (default: 5242880)
    /// - `WRITE_MAX_ATTEMPTS`: bulk calls per item (default: 3)
    /// - `RETRY_INITIAL_DELAY_MS`, `RETRY_MAX_DELAY_MS`: backoff (default: 100, 5000)
    /// - `DETERMINISTIC_IDS`: derive document ids (default: true)
    /// - `OBJECT_CONCURRENCY`: objects processed at once (default: 4)
    /// - `INVOCATION_TIMEOUT_SECS`: invocation deadline (default: none)
    /// - `DEADLINE_MARGIN_MS`: margin before the deadline (default: 2000)
    /// - `OBJECT_STORE`: `s3` or `local` (default: s3)
    /// - `AWS_REGION`, `S3_ENDPOINT`, `S3_ALLOW_HTTP`: S3 options
    /// - `LOCAL_OBJECT_ROOT`: root directory for the `local` store
    /// - `LOG_FORMAT`: `json` or `pretty` (default: json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let url = vars
            .get("OPENSEARCH_URL")
            .or_else(|| vars.get("OPENSEARCH_ENDPOINT"))
            .ok_or_else(|| ConfigError::Missing("OPENSEARCH_URL".to_string()))?;

        let mut opensearch = OpenSearchConfig::new(normalize_url(&url)).with_request_timeout(
            Duration::from_secs(
                vars.parse("OPENSEARCH_TIMEOUT_SECS", DEFAULT_OPENSEARCH_TIMEOUT_SECS)?,
            ),
        );
        let credentials = (vars.get("OPENSEARCH_USERNAME"), vars.get("OPENSEARCH_PASSWORD"));
        let auth_kind = vars.get("OPENSEARCH_AUTH").map(|kind| kind.to_ascii_lowercase());
        let auth_kind = match (auth_kind, &credentials) {
            (Some(kind), _) => kind,
            (None, (None, None)) => "none".to_string(),
            (None, _) => "basic".to_string(),
        };
        match auth_kind.as_str() {
            "none" => {}
            "basic" => match credentials {
                (Some(username), Some(password)) => {
                    opensearch = opensearch.with_basic_auth(username, password);
                }
                (_, None) => return Err(ConfigError::Missing("OPENSEARCH_PASSWORD".to_string())),
                (None, _) => return Err(ConfigError::Missing("OPENSEARCH_USERNAME".to_string())),
            },
            "sigv4" => {
                let region = vars
                    .get("OPENSEARCH_AWS_REGION")
                    .or_else(|| vars.get("AWS_REGION"))
                    .ok_or_else(|| ConfigError::Missing("AWS_REGION".to_string()))?;
                let service = vars
                    .get("OPENSEARCH_AWS_SERVICE")
                    .unwrap_or_else(|| DEFAULT_SIGV4_SERVICE.to_string());
                opensearch = opensearch.with_aws_sigv4(region, service);
            }
            other => {
                return Err(ConfigError::invalid(
                    "OPENSEARCH_AUTH",
                    other,
                    "expected 'none', 'basic' or 'sigv4'",
                ))
            }
        }

        let retry = RetryPolicy {
            max_attempts: vars.parse_at_least(
                "WRITE_MAX_ATTEMPTS",
                DEFAULT_WRITE_MAX_ATTEMPTS,
                1,
            )?,
            initial_delay_ms: vars.parse(
                "RETRY_INITIAL_DELAY_MS",
                DEFAULT_RETRY_INITIAL_DELAY_MS,
            )?,
            max_delay_ms: vars.parse("RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS)?,
        };

        let writer = WriterConfig {
            index_name: vars
                .get("INDEX_NAME")
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            retry,
            deterministic_ids: vars.parse_bool("DETERMINISTIC_IDS", true)?,
        };

        let max_bytes: usize = vars.parse("BATCH_MAX_BYTES", DEFAULT_BATCH_MAX_BYTES)?;
        let orchestrator = OrchestratorConfig {
            object_concurrency: vars.parse_at_least(
                "OBJECT_CONCURRENCY",
                DEFAULT_OBJECT_CONCURRENCY,
                1,
            )?,
            deadline_margin: Duration::from_millis(
                vars.parse("DEADLINE_MARGIN_MS", DEFAULT_DEADLINE_MARGIN_MS)?,
            ),
            batch: BatchConfig {
                max_records: vars.parse_at_least(
                    "BATCH_MAX_RECORDS",
                    DEFAULT_BATCH_MAX_RECORDS,
                    1,
                )?,
                max_bytes: (max_bytes > 0).then_some(max_bytes),
            },
        };

        let store = match vars.get("OBJECT_STORE").as_deref().unwrap_or("s3") {
            "s3" => StoreBackend::S3(S3Options {
                region: vars.get("AWS_REGION"),
                endpoint: vars.get("S3_ENDPOINT"),
                allow_http: vars.parse_bool("S3_ALLOW_HTTP", false)?,
            }),
            "local" => StoreBackend::Local {
                root: vars
                    .get("LOCAL_OBJECT_ROOT")
                    .map(PathBuf::from)
                    .ok_or_else(|| ConfigError::Missing("LOCAL_OBJECT_ROOT".to_string()))?,
            },
            other => {
                return Err(ConfigError::invalid(
                    "OBJECT_STORE",
                    other,
                    "expected 's3' or 'local'",
                ))
            }
        };

        let invocation_timeout = match vars.get("INVOCATION_TIMEOUT_SECS") {
            Some(value) => {
                let timeout = Duration::from_secs(vars.parse("INVOCATION_TIMEOUT_SECS", 0u64)?);
                // Every object would be skipped otherwise
                if timeout <= orchestrator.deadline_margin {
                    return Err(ConfigError::invalid(
                        "INVOCATION_TIMEOUT_SECS",
                        &value,
                        format!(
                            "must exceed DEADLINE_MARGIN_MS ({} ms)",
                            orchestrator.deadline_margin.as_millis()
                        ),
                    ));
                }
                Some(timeout)
            }
            None => None,
        };

        let log_format = match vars.get("LOG_FORMAT") {
            Some(value) => value
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &value, e))?,
            None => LogFormat::Json,
        };

        Ok(Self {
            opensearch,
            writer,
            orchestrator,
            store,
            invocation_timeout,
            log_format,
        })
    }
}

/// A bare host is taken as an HTTPS endpoint on port 443.
fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else if trimmed.contains(':') {
        format!("https://{}", trimmed)
    } else {
        format!("https://{}:443", trimmed)
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of `name`, with blank values treated as unset.
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name) {
            Some(value) => value
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(name, &value, e.to_string())),
            None => Ok(default),
        }
    }

    fn parse_at_least<T>(&self, name: &str, default: T, min: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Display + Copy,
        T::Err: Display,
    {
        let value = self.parse(name, default)?;
        if value < min {
            return Err(ConfigError::invalid(
                name,
                &value.to_string(),
                format!("must be at least {}", min),
            ));
        }
        Ok(value)
    }

    fn parse_bool(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(name, &value, "expected a boolean")),
            },
            None => Ok(default),
        }
    }
}
