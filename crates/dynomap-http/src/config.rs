//! HTTP transport configuration.

use std::time::Duration;

use typed_builder::TypedBuilder;

/// Endpoint of a local ruststack gateway.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4566";

/// Where and how [`HttpTransport`](crate::HttpTransport) sends requests.
///
/// # Examples
///
/// ```
/// use dynomap_http::HttpTransportConfig;
///
/// let config = HttpTransportConfig::builder()
///     .endpoint("http://localhost:8000/")
///     .build();
/// assert_eq!(config.endpoint(), "http://localhost:8000");
/// assert_eq!(config.region, "us-east-1");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct HttpTransportConfig {
    /// Base URL of the DynamoDB-compatible endpoint.
    #[builder(default = DEFAULT_ENDPOINT.to_owned(), setter(into))]
    pub endpoint: String,

    /// Region placed in the credential scope.
    #[builder(default = "us-east-1".to_owned(), setter(into))]
    pub region: String,

    /// Access key placed in the credential scope. Local endpoints use it to
    /// partition tables by account and never verify the signature.
    #[builder(default = "dynomap".to_owned(), setter(into))]
    pub access_key_id: String,

    /// Total time allowed for one request, connect included.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HttpTransportConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNOMAP_ENDPOINT` | `http://localhost:4566` |
    /// | `AWS_REGION` | `us-east-1` |
    /// | `AWS_ACCESS_KEY_ID` | `dynomap` |
    /// | `DYNOMAP_REQUEST_TIMEOUT_MS` | `30000` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNOMAP_ENDPOINT") {
            config.endpoint = v;
        }
        if let Ok(v) = std::env::var("AWS_REGION") {
            config.region = v;
        }
        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            config.access_key_id = v;
        }
        if let Some(ms) = std::env::var("DYNOMAP_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.request_timeout = Duration::from_millis(ms);
        }

        config
    }

    /// The endpoint without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
