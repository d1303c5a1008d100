//! Uniform key identity for get, delete and batch operations.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;

use crate::error::MapperResult;

/// A hash key with an optional range key.
///
/// Equality and hashing are structural over both parts, so ids can be used
/// as map keys when grouping batch results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    /// Hash key value.
    pub hash: Value,
    /// Range key value.
    pub range: Option<Value>,
}

impl CompositeId {
    /// A hash-only id.
    #[must_use]
    pub fn new(hash: impl Into<Value>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    /// A hash and range id.
    #[must_use]
    pub fn with_range(hash: impl Into<Value>, range: impl Into<Value>) -> Self {
        Self {
            hash: hash.into(),
            range: Some(range.into()),
        }
    }

    /// An id from any serializable key values.
    pub fn from_parts<H: Serialize, R: Serialize>(
        hash: &H,
        range: Option<&R>,
    ) -> MapperResult<Self> {
        Ok(Self {
            hash: serde_json::to_value(hash)?,
            range: range.map(serde_json::to_value).transpose()?,
        })
    }
}

impl Hash for CompositeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.to_string().hash(state);
        self.range.as_ref().map(Value::to_string).hash(state);
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}/{}", self.hash, range),
            None => write!(f, "{}", self.hash),
        }
    }
}
