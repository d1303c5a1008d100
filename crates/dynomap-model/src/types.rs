//! Shared DynamoDB shapes: key schemas, throughput, indexes, table
//! descriptions and batch request entries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;

// ---------------------------------------------------------------------------
// Wire string enums
// ---------------------------------------------------------------------------

/// Declares an enum that travels as a bare string and tolerates values newer
/// than this client by capturing them in an `Unknown` variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value this client does not recognise.
            Unknown(String),
        }

        impl $name {
            /// Returns the wire-format string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Unknown(s) => s.as_str(),
                }
            }

            /// Parses a wire-format string.
            fn from_wire(s: &str) -> Self {
                match s {
                    $( $wire => Self::$variant, )+
                    other => Self::Unknown(other.to_owned()),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from_wire(&s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Role of an attribute in a key schema.
    KeyType {
        /// Partition key.
        Hash => "HASH",
        /// Sort key.
        Range => "RANGE",
    }
}

wire_enum! {
    /// Scalar type of a key attribute.
    ScalarAttributeType {
        /// String.
        S => "S",
        /// Number.
        N => "N",
        /// Binary.
        B => "B",
    }
}

wire_enum! {
    /// Lifecycle status of a table.
    TableStatus {
        /// Being created.
        Creating => "CREATING",
        /// Being updated.
        Updating => "UPDATING",
        /// Being deleted.
        Deleting => "DELETING",
        /// Ready for use.
        Active => "ACTIVE",
        /// Encryption key is inaccessible.
        InaccessibleEncryptionCredentials => "INACCESSIBLE_ENCRYPTION_CREDENTIALS",
        /// Being archived.
        Archiving => "ARCHIVING",
        /// Archived.
        Archived => "ARCHIVED",
    }
}

wire_enum! {
    /// Lifecycle status of a global secondary index.
    IndexStatus {
        /// Being created.
        Creating => "CREATING",
        /// Being updated.
        Updating => "UPDATING",
        /// Being deleted.
        Deleting => "DELETING",
        /// Ready for use.
        Active => "ACTIVE",
    }
}

wire_enum! {
    /// Billing mode of a table.
    BillingMode {
        /// Explicit read/write capacity units.
        Provisioned => "PROVISIONED",
        /// On demand.
        PayPerRequest => "PAY_PER_REQUEST",
    }
}

wire_enum! {
    /// Which attributes an index carries.
    ProjectionType {
        /// Every attribute.
        All => "ALL",
        /// Only the table and index keys.
        KeysOnly => "KEYS_ONLY",
        /// The keys plus a list of non-key attributes.
        Include => "INCLUDE",
    }
}

wire_enum! {
    /// What a write operation returns.
    ReturnValue {
        /// Nothing.
        None => "NONE",
        /// The whole item before the write.
        AllOld => "ALL_OLD",
        /// The updated attributes before the write.
        UpdatedOld => "UPDATED_OLD",
        /// The whole item after the write.
        AllNew => "ALL_NEW",
        /// The updated attributes after the write.
        UpdatedNew => "UPDATED_NEW",
    }
}

wire_enum! {
    /// Which attributes a `Query` or `Scan` returns.
    Select {
        /// Every attribute of the item.
        AllAttributes => "ALL_ATTRIBUTES",
        /// Every attribute projected into the index.
        AllProjectedAttributes => "ALL_PROJECTED_ATTRIBUTES",
        /// The attributes named in the projection expression.
        SpecificAttributes => "SPECIFIC_ATTRIBUTES",
        /// Only the number of matching items.
        Count => "COUNT",
    }
}

impl Default for ProjectionType {
    fn default() -> Self {
        Self::All
    }
}

impl Default for ReturnValue {
    fn default() -> Self {
        Self::None
    }
}

impl ScalarAttributeType {
    /// The scalar type of a key value, `None` for non-scalar values.
    #[must_use]
    pub fn of(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(_) => Some(Self::S),
            AttributeValue::N(_) => Some(Self::N),
            AttributeValue::B(_) => Some(Self::B),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Key schema & attributes
// ---------------------------------------------------------------------------

/// One element of a table or index key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    /// The key attribute name.
    pub attribute_name: String,
    /// `HASH` or `RANGE`.
    pub key_type: KeyType,
}

impl KeySchemaElement {
    /// A partition key element.
    #[must_use]
    pub fn hash(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type: KeyType::Hash,
        }
    }

    /// A sort key element.
    #[must_use]
    pub fn range(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type: KeyType::Range,
        }
    }
}

/// Declares the scalar type of an attribute used in a key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// The attribute name.
    pub attribute_name: String,
    /// `S`, `N` or `B`.
    pub attribute_type: ScalarAttributeType,
}

// ---------------------------------------------------------------------------
// Billing & throughput
// ---------------------------------------------------------------------------

/// Read/write capacity units requested for a table or global index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    /// Strongly consistent reads per second.
    pub read_capacity_units: i64,
    /// Writes per second.
    pub write_capacity_units: i64,
}

// ---------------------------------------------------------------------------
// Secondary indexes
// ---------------------------------------------------------------------------

/// Attributes copied from the table into an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    /// The projection type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_type: Option<ProjectionType>,
    /// Non-key attributes projected when the type is `INCLUDE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

/// A global secondary index to create along with a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// Partition key and optional sort key of the index.
    pub key_schema: Vec<KeySchemaElement>,
    /// Projected attributes.
    pub projection: Projection,
    /// Capacity for the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

/// Status of a global secondary index as reported by `DescribeTable`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndexDescription {
    /// Index name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Current status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_status: Option<IndexStatus>,
}

/// A local secondary index to create along with a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// The table's partition key plus the index sort key.
    pub key_schema: Vec<KeySchemaElement>,
    /// Projected attributes.
    pub projection: Projection,
}

// ---------------------------------------------------------------------------
// Table description
// ---------------------------------------------------------------------------

/// A table as reported by `CreateTable`, `DescribeTable` and `DeleteTable`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    /// Table name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Current status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_status: Option<TableStatus>,
    /// Key schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_schema: Vec<KeySchemaElement>,
    /// Attribute definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Creation time in epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_time: Option<f64>,
    /// Approximate number of items, refreshed by the store every few hours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<i64>,
    /// Approximate size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_size_bytes: Option<i64>,
    /// Table ARN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_arn: Option<String>,
    /// Global secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndexDescription>,
}

impl TableDescription {
    /// Returns `true` once the table and all of its global indexes are active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.table_status == Some(TableStatus::Active)
            && self
                .global_secondary_indexes
                .iter()
                .all(|gsi| gsi.index_status.as_ref().is_none_or(|s| *s == IndexStatus::Active))
    }
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Keys to fetch from one table in a `BatchGetItem` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    /// Primary keys of the items to fetch.
    pub keys: Vec<Key>,
    /// Attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Placeholder names used by `projection_expression`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_attribute_names: Option<ExpressionAttributeNames>,
    /// Whether to read consistently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

/// A put or delete inside a `BatchWriteItem` call.
///
/// Exactly one of the two requests is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    /// Put an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    /// Delete an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}

impl WriteRequest {
    /// A put of the given item.
    #[must_use]
    pub fn put(item: Item) -> Self {
        Self {
            put_request: Some(PutRequest { item }),
            delete_request: None,
        }
    }

    /// A delete of the item with the given key.
    #[must_use]
    pub fn delete(key: Key) -> Self {
        Self {
            put_request: None,
            delete_request: Some(DeleteRequest { key }),
        }
    }
}

/// Put entry of a `WriteRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    /// The item to write.
    pub item: Item,
}

/// Delete entry of a `WriteRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    /// The key of the item to delete.
    pub key: Key,
}

// ---------------------------------------------------------------------------
// Item shapes
// ---------------------------------------------------------------------------

/// An item: attribute names to values.
pub type Item = HashMap<String, AttributeValue>;

/// A primary key: one or two key attributes.
pub type Key = HashMap<String, AttributeValue>;

/// `#name` placeholders to attribute names.
pub type ExpressionAttributeNames = HashMap<String, String>;

/// `:value` placeholders to attribute values.
pub type ExpressionAttributeValues = HashMap<String, AttributeValue>;
