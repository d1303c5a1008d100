//! The reqwest-backed [`DynamoTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dynomap_core::DynamoTransport;
use dynomap_model::{DynamoDBError, DynamoDBOperation};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::HttpTransportConfig;
use crate::error::{parse_error, verify_crc32};

/// Content type of `awsJson1_0` requests.
pub const AMZ_JSON: &str = "application/x-amz-json-1.0";

const TARGET_HEADER: &str = "x-amz-target";
const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

/// Sends operations to a DynamoDB-compatible endpoint over HTTP.
///
/// Requests carry a credential scope but no signature, which is what local
/// endpoints such as DynamoDB Local or a ruststack gateway expect.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: Arc<HttpTransportConfig>,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    pub fn new(config: HttpTransportConfig) -> Result<Self, DynamoDBError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                DynamoDBError::internal_error(format!("failed to build http client: {e}"))
                    .with_source(e)
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Build a transport over an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: HttpTransportConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// The configuration this transport was built with.
    #[must_use]
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn authorization(&self) -> String {
        let date = Utc::now().format("%Y%m%d");
        format!(
            "AWS4-HMAC-SHA256 Credential={}/{date}/{}/dynamodb/aws4_request, \
             SignedHeaders=content-type;host;x-amz-target, Signature=unsigned",
            self.config.access_key_id, self.config.region
        )
    }
}

#[async_trait]
impl DynamoTransport for HttpTransport {
    async fn send(&self, op: DynamoDBOperation, body: Bytes) -> Result<Bytes, DynamoDBError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .header(CONTENT_TYPE, AMZ_JSON)
            .header(TARGET_HEADER, op.target())
            .header(AUTHORIZATION, self.authorization())
            .body(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(request_error)?;
        debug!(
            operation = op.as_str(),
            status = status.as_u16(),
            request_id = headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
            "dynamodb response"
        );

        verify_crc32(&headers, &body)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(parse_error(status, &body))
        }
    }
}

/// Failures before a response arrives are reported as unavailability so the
/// retry harness treats them as transient. Malformed requests are not retried.
fn request_error(e: reqwest::Error) -> DynamoDBError {
    if e.is_builder() {
        DynamoDBError::validation(format!("invalid request: {e}")).with_source(e)
    } else if e.is_timeout() {
        DynamoDBError::service_unavailable(format!("request timed out: {e}")).with_source(e)
    } else {
        DynamoDBError::service_unavailable(format!("request failed: {e}")).with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use dynomap_model::DynamoDBErrorCode;
    use dynomap_model::input::ListTablesInput;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    /// Serve one canned response and hand back the raw request text.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
        crc32: Option<u32>,
    ) -> (HttpTransport, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let crc = crc32.unwrap_or_else(|| crc32fast::hash(body.as_bytes()));
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: {AMZ_JSON}\r\nx-amz-crc32: {crc}\r\n\
                 x-amzn-requestid: req-1\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });
        let config = HttpTransportConfig::builder().endpoint(endpoint).build();
        (HttpTransport::new(config).unwrap(), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= head_end + 4 + length
    }

    #[tokio::test]
    async fn test_should_post_operation_with_target_header() {
        let (transport, server) =
            serve_once("200 OK", r#"{"TableNames":["Orders"]}"#, None).await;

        let out = transport
            .list_tables(ListTablesInput {
                limit: Some(5),
                ..ListTablesInput::default()
            })
            .await
            .unwrap();

        assert_eq!(out.table_names, vec!["Orders"]);
        let request = server.await.unwrap();
        assert!(request.starts_with("post / http/1.1"));
        assert!(request.contains("x-amz-target: dynamodb_20120810.listtables"));
        assert!(request.contains("content-type: application/x-amz-json-1.0"));
        assert!(request.contains("credential=dynomap/"));
        assert!(request.contains(r#"{"limit":5}"#));
    }

    #[tokio::test]
    async fn test_should_map_error_response() {
        let (transport, server) = serve_once(
            "400 Bad Request",
            concat!(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","#,
                r#""Message":"Requested resource not found"}"#
            ),
            None,
        )
        .await;

        let err = transport
            .send(DynamoDBOperation::DescribeTable, Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.code, DynamoDBErrorCode::ResourceNotFoundException);
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Requested resource not found");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_should_reject_corrupted_body() {
        let (transport, server) = serve_once("200 OK", r#"{"TableNames":[]}"#, Some(7)).await;

        let err = transport
            .send(DynamoDBOperation::ListTables, Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.code, DynamoDBErrorCode::InternalServerError);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_should_report_unreachable_endpoint_as_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let transport =
            HttpTransport::new(HttpTransportConfig::builder().endpoint(endpoint).build()).unwrap();

        let err = transport
            .send(DynamoDBOperation::ListTables, Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.code, DynamoDBErrorCode::ServiceUnavailable);
        assert!(!err.is_client_error());
    }
}
