//! Response bodies for the twelve operations.
//!
//! Every collection is `#[serde(default)]` because the service omits empty
//! members from its responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Item, Key, KeysAndAttributes, TableDescription, WriteRequest};

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

/// `CreateTable` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableOutput {
    /// The table being created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_description: Option<TableDescription>,
}

/// `DeleteTable` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteTableOutput {
    /// The table being deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_description: Option<TableDescription>,
}

/// `DescribeTable` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableOutput {
    /// The table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableDescription>,
}

/// `ListTables` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTablesOutput {
    /// Table names in this page.
    #[serde(default)]
    pub table_names: Vec<String>,
    /// Cursor for the next page, absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_table_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

/// `PutItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemOutput {
    /// The previous item when `ReturnValues` was `ALL_OLD`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,
}

/// `GetItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemOutput {
    /// The item, absent when no item has the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// `UpdateItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemOutput {
    /// Attributes selected by `ReturnValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,
}

/// `DeleteItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemOutput {
    /// The deleted item when `ReturnValues` was `ALL_OLD`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// `Query` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    /// Matching items. Empty when `Select` was `COUNT`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Items in this page after filtering.
    #[serde(default)]
    pub count: i32,
    /// Items evaluated before filtering.
    #[serde(default)]
    pub scanned_count: i32,
    /// Cursor for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Key,
}

/// `Scan` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    /// Matching items. Empty when `Select` was `COUNT`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Items in this page after filtering.
    #[serde(default)]
    pub count: i32,
    /// Items evaluated before filtering.
    #[serde(default)]
    pub scanned_count: i32,
    /// Cursor for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Key,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// `BatchGetItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemOutput {
    /// Fetched items, per table.
    #[serde(default)]
    pub responses: HashMap<String, Vec<Item>>,
    /// Keys the service did not get to. Resend them in a new request.
    #[serde(default)]
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

/// `BatchWriteItem` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemOutput {
    /// Writes the service did not get to. Resend them in a new request.
    #[serde(default)]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}
