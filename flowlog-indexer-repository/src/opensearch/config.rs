//! Connection settings for the OpenSearch client.

use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Signing service name for Amazon OpenSearch Service domains.
pub const DEFAULT_SIGV4_SERVICE: &str = "es";

/// How requests to the cluster are authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OpenSearchAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// AWS Signature Version 4 with credentials from the default AWS
    /// provider chain (environment, profile, container or instance role).
    AwsSigV4 {
        region: String,
        /// `es` for managed domains, `aoss` for serverless collections.
        service: String,
    },
}

impl OpenSearchAuth {
    /// Short name used in logs; never includes secrets.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic { .. } => "basic",
            Self::AwsSigV4 { .. } => "sigv4",
        }
    }
}

/// Connection settings for [`OpenSearchClient`](super::OpenSearchClient).
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Cluster URL, e.g. `https://search-domain.example.com:443`.
    pub url: String,
    pub auth: OpenSearchAuth,
    pub request_timeout: Duration,
}

impl OpenSearchConfig {
    /// Create a config for `url` with no credentials and the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: OpenSearchAuth::None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use basic auth credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = OpenSearchAuth::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Sign requests with AWS SigV4 for `service` in `region`.
    pub fn with_aws_sigv4(mut self, region: impl Into<String>, service: impl Into<String>) -> Self {
        self.auth = OpenSearchAuth::AwsSigV4 {
            region: region.into(),
            service: service.into(),
        };
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
