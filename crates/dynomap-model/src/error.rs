//! Errors reported by a DynamoDB endpoint.
//!
//! The service answers failures with a JSON body whose `__type` field holds a
//! (possibly namespaced) error type name and whose `message`/`Message` field
//! holds a human readable description.

use std::fmt;

/// Well-known DynamoDB error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DynamoDBErrorCode {
    /// Table already exists or is being created/deleted.
    ResourceInUseException,
    /// Table or index not found.
    ResourceNotFoundException,
    /// Condition expression evaluated to false.
    ConditionalCheckFailedException,
    /// Transaction canceled.
    TransactionCanceledException,
    /// Transaction conflict.
    TransactionConflictException,
    /// Item collection size limit exceeded.
    ItemCollectionSizeLimitExceededException,
    /// Provisioned throughput exceeded.
    ProvisionedThroughputExceededException,
    /// Request was throttled.
    ThrottlingException,
    /// Too many concurrent control plane operations.
    LimitExceededException,
    /// Account level request limit exceeded.
    RequestLimitExceeded,
    /// Validation error.
    #[default]
    ValidationException,
    /// Malformed request body.
    SerializationException,
    /// Internal server error.
    InternalServerError,
    /// Service temporarily unavailable.
    ServiceUnavailable,
    /// Access denied.
    AccessDeniedException,
    /// Unknown operation or bad credentials.
    UnrecognizedClientException,
    /// An error type this client does not know about.
    Unknown,
}

impl DynamoDBErrorCode {
    /// All codes with a well-known wire name.
    const KNOWN: &'static [Self] = &[
        Self::ResourceInUseException,
        Self::ResourceNotFoundException,
        Self::ConditionalCheckFailedException,
        Self::TransactionCanceledException,
        Self::TransactionConflictException,
        Self::ItemCollectionSizeLimitExceededException,
        Self::ProvisionedThroughputExceededException,
        Self::ThrottlingException,
        Self::LimitExceededException,
        Self::RequestLimitExceeded,
        Self::ValidationException,
        Self::SerializationException,
        Self::InternalServerError,
        Self::ServiceUnavailable,
        Self::AccessDeniedException,
        Self::UnrecognizedClientException,
    ];

    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceInUseException => "ResourceInUseException",
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TransactionCanceledException => "TransactionCanceledException",
            Self::TransactionConflictException => "TransactionConflictException",
            Self::ItemCollectionSizeLimitExceededException => {
                "ItemCollectionSizeLimitExceededException"
            }
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::ThrottlingException => "ThrottlingException",
            Self::LimitExceededException => "LimitExceededException",
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ValidationException => "ValidationException",
            Self::SerializationException => "SerializationException",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::AccessDeniedException => "AccessDeniedException",
            Self::UnrecognizedClientException => "UnrecognizedClientException",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse an error type name as found in the `__type` field.
    ///
    /// Accepts both the short form (`ThrottlingException`) and the namespaced
    /// form (`com.amazonaws.dynamodb.v20120810#ThrottlingException`). Names
    /// that are not recognised map to [`DynamoDBErrorCode::Unknown`].
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Self {
        let short = type_name.rsplit('#').next().unwrap_or(type_name);
        Self::KNOWN
            .iter()
            .copied()
            .find(|code| code.as_str() == short)
            .unwrap_or(Self::Unknown)
    }

    fn default_status_code(self) -> http::StatusCode {
        match self {
            Self::InternalServerError | Self::Unknown => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            _ => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned by the store (or synthesised by a transport).
#[derive(Debug)]
pub struct DynamoDBError {
    /// The error code.
    pub code: DynamoDBErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code the error arrived with.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DynamoDBError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl DynamoDBError {
    /// Create a new `DynamoDBError` from an error code.
    #[must_use]
    pub fn new(code: DynamoDBErrorCode) -> Self {
        Self::with_message(code, code.as_str())
    }

    /// Create a new `DynamoDBError` with a custom message.
    #[must_use]
    pub fn with_message(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Override the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status_code: http::StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns `true` for errors in the 4xx (bad request) class.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code.is_client_error()
    }

    /// Returns `true` if the error carries the given code.
    #[must_use]
    pub fn is(&self, code: DynamoDBErrorCode) -> bool {
        self.code == code
    }

    // -- Convenience constructors --

    /// Table already exists.
    #[must_use]
    pub fn resource_in_use(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ResourceInUseException, message)
    }

    /// Table or resource not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ResourceNotFoundException, message)
    }

    /// Condition expression evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ConditionalCheckFailedException, message)
    }

    /// Request was throttled.
    #[must_use]
    pub fn throttling(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ThrottlingException, message)
    }

    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ValidationException, message)
    }

    /// Serialization error.
    #[must_use]
    pub fn serialization_exception(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::SerializationException, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::InternalServerError, message)
    }

    /// The endpoint could not be reached or answered with a 503.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ServiceUnavailable, message)
    }
}

/// Create a `DynamoDBError` from an error code.
///
/// # Examples
///
/// ```
/// use dynomap_model::dynamodb_error;
/// use dynomap_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(ThrottlingException);
/// assert_eq!(err.code, DynamoDBErrorCode::ThrottlingException);
///
/// let err = dynamodb_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident) => {
        $crate::error::DynamoDBError::new($crate::error::DynamoDBErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::with_message($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_namespaced_type_name() {
        assert_eq!(
            DynamoDBErrorCode::from_type_name(
                "com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException"
            ),
            DynamoDBErrorCode::ProvisionedThroughputExceededException
        );
        assert_eq!(
            DynamoDBErrorCode::from_type_name("com.amazon.coral.validate#ValidationException"),
            DynamoDBErrorCode::ValidationException
        );
    }

    #[test]
    fn test_should_parse_short_type_name() {
        assert_eq!(
            DynamoDBErrorCode::from_type_name("LimitExceededException"),
            DynamoDBErrorCode::LimitExceededException
        );
    }

    #[test]
    fn test_should_map_unrecognised_type_to_unknown() {
        let code = DynamoDBErrorCode::from_type_name("com.example#Exploded");
        assert_eq!(code, DynamoDBErrorCode::Unknown);
        assert!(code.default_status_code().is_server_error());
    }

    #[test]
    fn test_should_classify_client_errors() {
        assert!(DynamoDBError::throttling("slow down").is_client_error());
        assert!(!DynamoDBError::internal_error("boom").is_client_error());
        assert!(!DynamoDBError::service_unavailable("down").is_client_error());
    }
}
