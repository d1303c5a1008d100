//! Per-field metadata.

use std::fmt;

use dynomap_model::types::ScalarAttributeType;
use serde_json::Value;

use crate::error::MapperResult;
use crate::metadata::schema::{FieldType, Record};

/// Attribute type a field is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    /// `S`
    String,
    /// `N`
    Number,
    /// `B`
    Binary,
    /// `BOOL`
    Bool,
    /// `SS`
    StringSet,
    /// `NS`
    NumberSet,
    /// `BS`
    BinarySet,
    /// `L`
    List,
    /// `M`
    Map,
    /// `NULL`
    Null,
}

impl DbType {
    /// The key attribute type, `None` for types that cannot be keys.
    #[must_use]
    pub fn scalar_attribute_type(self) -> Option<ScalarAttributeType> {
        match self {
            Self::String => Some(ScalarAttributeType::S),
            Self::Number => Some(ScalarAttributeType::N),
            Self::Binary => Some(ScalarAttributeType::B),
            _ => None,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
            Self::Bool => "BOOL",
            Self::StringSet => "SS",
            Self::NumberSet => "NS",
            Self::BinarySet => "BS",
            Self::List => "L",
            Self::Map => "M",
            Self::Null => "NULL",
        };
        f.write_str(s)
    }
}

/// A resolved field of a table or nested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Attribute name on the wire.
    pub name: String,
    /// Member name in the record's serde form.
    pub native_name: String,
    /// Native shape.
    pub field_type: FieldType,
    /// Attribute type.
    pub db_type: DbType,
    /// Part of the table's hash key.
    pub is_hash_key: bool,
    /// Part of the table's range key.
    pub is_range_key: bool,
    /// Assigned from a sequence when zero.
    pub is_auto_increment: bool,
    /// Declared primary key.
    pub is_primary_key: bool,
    /// Never written as null.
    pub exclude_null_value: bool,
    /// Name of the referenced table, for child rows keyed by a parent id.
    pub references: Option<String>,
}

impl FieldMetadata {
    /// Returns `true` for the hash or range key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.is_hash_key || self.is_range_key
    }

    /// Matches either the wire or the native name.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.native_name == name
    }

    /// The value of this field in a record document.
    #[must_use]
    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        doc.get(&self.native_name)
    }

    /// Set this field in a record document. Non-object documents are left alone.
    pub fn set(&self, doc: &mut Value, value: Value) {
        if let Value::Object(map) = doc {
            map.insert(self.native_name.clone(), value);
        }
    }

    /// Read this field from a record.
    pub fn read<T: Record>(&self, record: &T) -> MapperResult<Value> {
        let doc = serde_json::to_value(record)?;
        Ok(self.get(&doc).cloned().unwrap_or(Value::Null))
    }

    /// Write this field into a record.
    pub fn write<T: Record>(&self, record: &mut T, value: Value) -> MapperResult<()> {
        let mut doc = serde_json::to_value(&*record)?;
        self.set(&mut doc, value);
        *record = serde_json::from_value(doc)?;
        Ok(())
    }

    /// The key attribute type of this field.
    #[must_use]
    pub fn scalar_attribute_type(&self) -> Option<ScalarAttributeType> {
        self.db_type.scalar_attribute_type()
    }
}

/// Returns `true` for values a record carries when a field was never set:
/// null, zero, `false`, and empty strings or collections.
#[must_use]
pub fn is_default_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
