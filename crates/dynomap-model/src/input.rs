//! Request bodies for the twelve operations.
//!
//! Optional fields are omitted when `None` and empty maps/vectors are omitted
//! entirely, so a default-constructed request serializes to the minimal body
//! the service accepts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::types::{
    AttributeDefinition, BillingMode, ExpressionAttributeNames, ExpressionAttributeValues,
    GlobalSecondaryIndex, Item, Key, KeySchemaElement, KeysAndAttributes, LocalSecondaryIndex,
    ProvisionedThroughput, ReturnValue, Select, WriteRequest,
};

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

/// `CreateTable` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableInput {
    /// The table name.
    pub table_name: String,
    /// Partition key and optional sort key.
    pub key_schema: Vec<KeySchemaElement>,
    /// Types of every attribute used in the table or index key schemas.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Billing mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<BillingMode>,
    /// Capacity when billing is `PROVISIONED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Global secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    /// Local secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
}

/// `DeleteTable` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteTableInput {
    /// The table name.
    pub table_name: String,
}

/// `DescribeTable` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableInput {
    /// The table name.
    pub table_name: String,
}

/// `ListTables` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTablesInput {
    /// Continue after this table name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_table_name: Option<String>,
    /// Page size, at most 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

/// `PutItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemInput {
    /// The table name.
    pub table_name: String,
    /// The item, including its key attributes.
    pub item: Item,
    /// Precondition for the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Placeholder values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    /// `NONE` or `ALL_OLD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

/// `GetItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemInput {
    /// The table name.
    pub table_name: String,
    /// Primary key of the item.
    pub key: Key,
    /// Whether to read consistently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    /// Attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
}

/// `UpdateItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemInput {
    /// The table name.
    pub table_name: String,
    /// Primary key of the item.
    pub key: Key,
    /// `SET`, `ADD`, `REMOVE` clauses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_expression: Option<String>,
    /// Precondition for the update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Placeholder values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    /// Which attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

/// `DeleteItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemInput {
    /// The table name.
    pub table_name: String,
    /// Primary key of the item.
    pub key: Key,
    /// Precondition for the delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Placeholder values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    /// `NONE` or `ALL_OLD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// `Query` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    /// The table name.
    pub table_name: String,
    /// Index to query instead of the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Condition on the partition key and optionally the sort key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,
    /// Residual condition applied after the key condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Placeholder values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    /// Ascending (`true`) or descending sort key order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,
    /// Maximum number of items evaluated per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    /// Continuation cursor from a previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: HashMap<String, AttributeValue>,
    /// Which attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    /// Whether to read consistently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

/// `Scan` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanInput {
    /// The table name.
    pub table_name: String,
    /// Index to scan instead of the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Condition applied to every scanned item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Placeholder names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Placeholder values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    /// Maximum number of items evaluated per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    /// Continuation cursor from a previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: HashMap<String, AttributeValue>,
    /// Segment of a parallel scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<i32>,
    /// Number of segments of a parallel scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<i32>,
    /// Which attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    /// Whether to read consistently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// `BatchGetItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemInput {
    /// Keys to fetch, per table. At most 100 keys in total.
    pub request_items: HashMap<String, KeysAndAttributes>,
}

/// `BatchWriteItem` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemInput {
    /// Puts and deletes, per table. At most 25 requests in total.
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}
