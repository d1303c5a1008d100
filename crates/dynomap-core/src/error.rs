//! Error taxonomy for the mapper.

use std::time::Duration;

use dynomap_model::{DynamoDBError, DynamoDBErrorCode};

/// Errors raised by the mapping engine.
///
/// Schema and expression errors are programmer errors raised at the point of
/// misuse. Store errors are classified by [`crate::exec::RetryPolicy`]: only
/// transient ones are retried, and they surface as [`MapperError::Timeout`]
/// once the retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// A type declaration cannot be turned into a table schema.
    #[error("invalid schema for {type_name}: {message}")]
    Schema {
        /// The offending type.
        type_name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The type was never registered as a table.
    #[error("{type_name} is not registered as a table")]
    NotRegistered {
        /// The unregistered type.
        type_name: String,
    },

    /// The expression uses a construct that has no store equivalent.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// An index lookup expression references more than one field.
    #[error(
        "only one index can be queried per request, expression references {}",
        fields.join(", ")
    )]
    AmbiguousIndex {
        /// The distinct fields referenced.
        fields: Vec<String>,
    },

    /// Transient failures persisted past the retry budget.
    #[error("gave up after {elapsed:?}: {source}")]
    Timeout {
        /// Time spent retrying.
        elapsed: Duration,
        /// The last error observed.
        source: DynamoDBError,
    },

    /// The caller's cancellation token fired during a wait.
    #[error("operation cancelled")]
    Cancelled,

    /// A non-transient store error, propagated unchanged.
    #[error(transparent)]
    Store(#[from] DynamoDBError),

    /// A value cannot be converted to or from its attribute representation.
    #[error("cannot convert {what}: {message}")]
    Conversion {
        /// The field or value being converted.
        what: String,
        /// Why it failed.
        message: String,
    },

    /// A record failed to (de)serialize through serde.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl MapperError {
    /// Create a [`MapperError::Schema`].
    #[must_use]
    pub fn schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a [`MapperError::Conversion`].
    #[must_use]
    pub fn conversion(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a [`MapperError::UnsupportedExpression`].
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedExpression(message.into())
    }

    /// The store error code, for store errors and timeouts.
    #[must_use]
    pub fn store_code(&self) -> Option<DynamoDBErrorCode> {
        match self {
            Self::Store(e) | Self::Timeout { source: e, .. } => Some(e.code),
            _ => None,
        }
    }

    /// Returns `true` if the store reported a missing table or index.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.store_code() == Some(DynamoDBErrorCode::ResourceNotFoundException)
    }

    /// Returns `true` if a condition expression evaluated to false.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        self.store_code() == Some(DynamoDBErrorCode::ConditionalCheckFailedException)
    }
}

/// Result alias used across the crate.
pub type MapperResult<T> = Result<T, MapperError>;
