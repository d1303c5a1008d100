//! Atomic counters backing auto-increment fields.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use dynomap_model::{AttributeValue, DynamoDBOperation};
use dynomap_model::input::{CreateTableInput, GetItemInput, PutItemInput, UpdateItemInput};
use dynomap_model::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, ProvisionedThroughput, ReturnValue,
    ScalarAttributeType,
};

use crate::error::{MapperError, MapperResult};
use crate::exec::{Executor, create_tables, wait_for_tables_ready};

/// Default name of the counters table.
pub const SEQUENCE_TABLE: &str = "Seq";

const ID: &str = "Id";
const COUNTER: &str = "Counter";

/// A source of named, atomically incremented counters.
#[async_trait]
pub trait SequenceSource: Send + Sync + fmt::Debug {
    /// Create whatever storage the counters need.
    async fn init_schema(&self) -> MapperResult<()>;

    /// Add `amount` to the counter and return the new value.
    async fn increment(&self, key: &str, amount: i64) -> MapperResult<i64>;

    /// Set the counter so the next increment by one returns `starting_at + 1`.
    async fn reset(&self, key: &str, starting_at: i64) -> MapperResult<()>;

    /// The current value, zero for a counter never incremented.
    async fn current(&self, key: &str) -> MapperResult<i64>;

    /// Reserve `count` consecutive values with a single increment.
    async fn next_sequences(&self, key: &str, count: usize) -> MapperResult<Vec<i64>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let amount = i64::try_from(count)
            .map_err(|_| MapperError::conversion(key, "sequence block too large"))?;
        let last = self.increment(key, amount).await?;
        Ok((last - amount + 1..=last).collect())
    }
}

// ---------------------------------------------------------------------------
// DynamoDB backed
// ---------------------------------------------------------------------------

/// Counters stored as items of a `Seq` table (`Id` string hash key, numeric
/// `Counter`), incremented with `ADD`.
#[derive(Debug, Clone)]
pub struct DynamoSequenceSource {
    executor: Executor,
    table: String,
    throughput: (i64, i64),
    poll: std::time::Duration,
}

impl DynamoSequenceSource {
    /// Counters in the default `Seq` table.
    #[must_use]
    pub fn new(executor: Executor, throughput: (i64, i64), poll: std::time::Duration) -> Self {
        Self {
            executor,
            table: SEQUENCE_TABLE.to_owned(),
            throughput,
            poll,
        }
    }

    /// Use another table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// The counters table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn key(&self, key: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([(ID.to_owned(), AttributeValue::S(key.to_owned()))])
    }

    fn create_table_input(&self) -> CreateTableInput {
        let (read, write) = self.throughput;
        CreateTableInput {
            table_name: self.table.clone(),
            key_schema: vec![KeySchemaElement::hash(ID)],
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: ID.to_owned(),
                attribute_type: ScalarAttributeType::S,
            }],
            billing_mode: Some(BillingMode::Provisioned),
            provisioned_throughput: Some(ProvisionedThroughput {
                read_capacity_units: read,
                write_capacity_units: write,
            }),
            ..CreateTableInput::default()
        }
    }
}

fn counter_value(item: &HashMap<String, AttributeValue>, key: &str) -> MapperResult<i64> {
    match item.get(COUNTER) {
        None => Ok(0),
        Some(AttributeValue::N(n)) => n
            .parse()
            .map_err(|_| MapperError::conversion(key, format!("counter {n} is not an integer"))),
        Some(other) => Err(MapperError::conversion(
            key,
            format!("counter has type {}", other.type_descriptor()),
        )),
    }
}

#[async_trait]
impl SequenceSource for DynamoSequenceSource {
    async fn init_schema(&self) -> MapperResult<()> {
        create_tables(&self.executor, vec![self.create_table_input()]).await?;
        wait_for_tables_ready(&self.executor, &[self.table.clone()], self.poll, None).await
    }

    async fn increment(&self, key: &str, amount: i64) -> MapperResult<i64> {
        let input = UpdateItemInput {
            table_name: self.table.clone(),
            key: self.key(key),
            update_expression: Some("ADD #c :amount".to_owned()),
            expression_attribute_names: HashMap::from([("#c".to_owned(), COUNTER.to_owned())]),
            expression_attribute_values: HashMap::from([(
                ":amount".to_owned(),
                AttributeValue::number(amount),
            )]),
            return_values: Some(ReturnValue::UpdatedNew),
            ..UpdateItemInput::default()
        };
        let out = self
            .executor
            .exec(DynamoDBOperation::UpdateItem, &self.table, |transport| {
                let input = input.clone();
                async move { transport.update_item(input).await }
            })
            .await?;
        counter_value(&out.attributes, key)
    }

    async fn reset(&self, key: &str, starting_at: i64) -> MapperResult<()> {
        let mut item = self.key(key);
        item.insert(COUNTER.to_owned(), AttributeValue::number(starting_at));
        let input = PutItemInput {
            table_name: self.table.clone(),
            item,
            ..PutItemInput::default()
        };
        self.executor
            .exec(DynamoDBOperation::PutItem, &self.table, |transport| {
                let input = input.clone();
                async move { transport.put_item(input).await }
            })
            .await?;
        Ok(())
    }

    async fn current(&self, key: &str) -> MapperResult<i64> {
        let input = GetItemInput {
            table_name: self.table.clone(),
            key: self.key(key),
            consistent_read: Some(true),
            ..GetItemInput::default()
        };
        let out = self
            .executor
            .exec(DynamoDBOperation::GetItem, &self.table, |transport| {
                let input = input.clone();
                async move { transport.get_item(input).await }
            })
            .await?;
        out.item.map_or(Ok(0), |item| counter_value(&item, key))
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Process-local counters.
#[derive(Debug, Default)]
pub struct MemorySequenceSource {
    counters: DashMap<String, i64>,
}

impl MemorySequenceSource {
    /// Empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceSource for MemorySequenceSource {
    async fn init_schema(&self) -> MapperResult<()> {
        Ok(())
    }

    async fn increment(&self, key: &str, amount: i64) -> MapperResult<i64> {
        let mut counter = self.counters.entry(key.to_owned()).or_insert(0);
        *counter = counter
            .checked_add(amount)
            .ok_or_else(|| MapperError::conversion(key, "sequence counter overflow"))?;
        Ok(*counter)
    }

    async fn reset(&self, key: &str, starting_at: i64) -> MapperResult<()> {
        self.counters.insert(key.to_owned(), starting_at);
        Ok(())
    }

    async fn current(&self, key: &str) -> MapperResult<i64> {
        Ok(self.counters.get(key).map_or(0, |c| *c))
    }
}
