//! Decoding failed responses.

use dynomap_model::{DynamoDBError, DynamoDBErrorCode};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;

/// Header carrying the CRC32 of the response body.
pub const CRC32_HEADER: &str = "x-amz-crc32";

/// JSON error body: `{"__type": "...#Code", "Message": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    type_name: Option<String>,
    #[serde(rename = "message", alias = "Message")]
    message: Option<String>,
}

/// Build a [`DynamoDBError`] from a non-success response.
///
/// Bodies that are not the JSON error shape keep their text as the message
/// and are classified by status alone.
#[must_use]
pub fn parse_error(status: StatusCode, body: &[u8]) -> DynamoDBError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let code = match parsed.type_name.as_deref() {
        Some(type_name) => DynamoDBErrorCode::from_type_name(type_name),
        None if status == StatusCode::SERVICE_UNAVAILABLE => DynamoDBErrorCode::ServiceUnavailable,
        None if status.is_server_error() => DynamoDBErrorCode::InternalServerError,
        None => DynamoDBErrorCode::Unknown,
    };
    let message = parsed.message.unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body).trim().to_owned();
        if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_owned()
        } else {
            text
        }
    });
    DynamoDBError::with_message(code, message).with_status(status)
}

/// Check the body against the `x-amz-crc32` header when the server sent one.
pub fn verify_crc32(headers: &HeaderMap, body: &[u8]) -> Result<(), DynamoDBError> {
    let Some(expected) = headers.get(CRC32_HEADER) else {
        return Ok(());
    };
    let expected = expected
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok());
    let actual = crc32fast::hash(body);
    if expected == Some(actual) {
        Ok(())
    } else {
        Err(DynamoDBError::internal_error(format!(
            "response checksum mismatch: expected {expected:?}, computed {actual}"
        )))
    }
}
