//! Declarative description of a record type.
//!
//! A [`Record`] describes its own shape once through [`TypeSchema`]; the
//! registry turns that description into [`crate::metadata::TableMetadata`].

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::metadata::field::DbType;

/// A type stored in (or nested inside) a table.
///
/// The record's serde form is its document: field names in [`TypeSchema`]
/// refer to the serialized member names.
///
/// ```
/// use dynomap_core::metadata::{Field, FieldType, Record, TypeSchema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct Customer {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for Customer {
///     fn schema() -> TypeSchema {
///         TypeSchema::new("Customer")
///             .field(Field::new("Id", FieldType::Int).auto_increment())
///             .field(Field::new("Name", FieldType::String))
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The declared shape of this type.
    fn schema() -> TypeSchema;
}

/// A type describing a secondary index of `Table`.
///
/// Its own key inference decides the index keys and its fields decide the
/// projection.
pub trait IndexRecord: Record {
    /// The table the index belongs to.
    type Table: Record;
}

/// A copyable handle to a [`Record`] type.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    schema: fn() -> TypeSchema,
}

impl TypeRef {
    /// Handle of `T`.
    #[must_use]
    pub fn of<T: Record>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            schema: T::schema,
        }
    }

    /// The Rust type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Build the declared schema.
    #[must_use]
    pub fn schema(&self) -> TypeSchema {
        (self.schema)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Native shape of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Text.
    String,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    UInt,
    /// Floating point number.
    Float,
    /// Boolean.
    Bool,
    /// Byte buffer.
    Bytes,
    /// Timestamp, serialized as RFC 3339.
    DateTime,
    /// Unit-only enum with the given variant names, in declaration order.
    Enum(&'static [&'static str]),
    /// Set of strings.
    StringSet,
    /// Set of numbers.
    NumberSet,
    /// Set of byte buffers.
    BinarySet,
    /// Ordered list of elements.
    List(Box<FieldType>),
    /// String-keyed dictionary.
    Map(Box<FieldType>),
    /// Nested record stored as a map.
    Record(TypeRef),
    /// Anything else, stored as JSON text.
    Json,
    /// Converted by the named converter registered on [`crate::convert::Converters`].
    Custom(&'static str),
}

impl FieldType {
    /// Nested record type `T`.
    #[must_use]
    pub fn record<T: Record>() -> Self {
        Self::Record(TypeRef::of::<T>())
    }

    /// List of `element`.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Dictionary of `value`.
    #[must_use]
    pub fn map(value: Self) -> Self {
        Self::Map(Box::new(value))
    }

    /// Attribute type used when the field does not override it.
    #[must_use]
    pub fn default_db_type(&self) -> DbType {
        match self {
            Self::String | Self::DateTime | Self::Enum(_) | Self::Json | Self::Custom(_) => {
                DbType::String
            }
            Self::Int | Self::UInt | Self::Float => DbType::Number,
            Self::Bool => DbType::Bool,
            Self::Bytes => DbType::Binary,
            Self::StringSet => DbType::StringSet,
            Self::NumberSet => DbType::NumberSet,
            Self::BinarySet => DbType::BinarySet,
            Self::List(_) => DbType::List,
            Self::Map(_) | Self::Record(_) => DbType::Map,
        }
    }

    /// The record type nested in this field, looking through lists and maps.
    #[must_use]
    pub fn nested_type(&self) -> Option<TypeRef> {
        match self {
            Self::Record(t) => Some(*t),
            Self::List(inner) | Self::Map(inner) => inner.nested_type(),
            _ => None,
        }
    }

    /// Type of the elements of a collection, or of the field itself.
    #[must_use]
    pub fn element_type(&self) -> Self {
        match self {
            Self::StringSet => Self::String,
            Self::NumberSet => Self::Float,
            Self::BinarySet => Self::Bytes,
            Self::List(inner) | Self::Map(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }
}

/// One declared field of a [`TypeSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub(crate) native_name: String,
    pub(crate) alias: Option<String>,
    pub(crate) field_type: FieldType,
    pub(crate) db_type: Option<DbType>,
    pub(crate) hash_key: bool,
    pub(crate) range_key: bool,
    pub(crate) references: Option<String>,
    pub(crate) primary_key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) index: bool,
    pub(crate) exclude_null: bool,
}

impl Field {
    /// A field with the given serialized member name.
    #[must_use]
    pub fn new(native_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            native_name: native_name.into(),
            alias: None,
            field_type,
            db_type: None,
            hash_key: false,
            range_key: false,
            references: None,
            primary_key: false,
            auto_increment: false,
            index: false,
            exclude_null: false,
        }
    }

    /// Mark as the hash key.
    #[must_use]
    pub fn hash_key(mut self) -> Self {
        self.hash_key = true;
        self
    }

    /// Mark as the range key.
    #[must_use]
    pub fn range_key(mut self) -> Self {
        self.range_key = true;
        self
    }

    /// Mark as a reference to the id of another table.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    /// Mark as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Assign from a sequence when left at zero. Implies primary key.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Create a local index ranged on this field.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Never write this attribute when it is null.
    #[must_use]
    pub fn exclude_null(mut self) -> Self {
        self.exclude_null = true;
        self
    }

    /// Store under a different attribute name.
    #[must_use]
    pub fn alias(mut self, wire_name: impl Into<String>) -> Self {
        self.alias = Some(wire_name.into());
        self
    }

    /// Override the attribute type.
    #[must_use]
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }
}

/// The declared shape of a record type.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) fields: Vec<Field>,
    pub(crate) composite_key: Option<Vec<String>>,
    pub(crate) global_indexes: Vec<TypeRef>,
    pub(crate) local_indexes: Vec<TypeRef>,
    pub(crate) throughput: Option<(i64, i64)>,
}

impl TypeSchema {
    /// A schema for the type called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            fields: Vec::new(),
            composite_key: None,
            global_indexes: Vec::new(),
            local_indexes: Vec::new(),
            throughput: None,
        }
    }

    /// Store under a different table name.
    #[must_use]
    pub fn alias(mut self, table_name: impl Into<String>) -> Self {
        self.alias = Some(table_name.into());
        self
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare `[hash]` or `[hash, range]` by field name.
    #[must_use]
    pub fn composite_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composite_key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add a global secondary index described by `I`.
    #[must_use]
    pub fn global_index<I: IndexRecord>(mut self) -> Self {
        self.global_indexes.push(TypeRef::of::<I>());
        self
    }

    /// Add a local secondary index described by `I`.
    #[must_use]
    pub fn local_index<I: IndexRecord>(mut self) -> Self {
        self.local_indexes.push(TypeRef::of::<I>());
        self
    }

    /// Provisioned read and write capacity.
    #[must_use]
    pub fn throughput(mut self, read_capacity_units: i64, write_capacity_units: i64) -> Self {
        self.throughput = Some((read_capacity_units, write_capacity_units));
        self
    }

    /// The store-visible name: the alias, or the type name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_field_types_to_db_types() {
        assert_eq!(FieldType::Int.default_db_type(), DbType::Number);
        assert_eq!(FieldType::DateTime.default_db_type(), DbType::String);
        assert_eq!(FieldType::list(FieldType::Int).default_db_type(), DbType::List);
        assert_eq!(FieldType::map(FieldType::String).default_db_type(), DbType::Map);
        assert_eq!(FieldType::Bytes.default_db_type(), DbType::Binary);
    }

    #[test]
    fn test_should_use_alias_as_table_name() {
        let schema = TypeSchema::new("Customer").alias("Customers");
        assert_eq!(schema.table_name(), "Customers");
        assert_eq!(TypeSchema::new("Order").table_name(), "Order");
    }

    #[test]
    fn test_should_report_element_types() {
        assert_eq!(FieldType::StringSet.element_type(), FieldType::String);
        assert_eq!(FieldType::list(FieldType::Bool).element_type(), FieldType::Bool);
        assert_eq!(FieldType::Int.element_type(), FieldType::Int);
    }
}
