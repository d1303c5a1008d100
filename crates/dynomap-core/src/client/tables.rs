//! Table registration and lifecycle.

use std::sync::Arc;

use dynomap_model::input::{CreateTableInput, DescribeTableInput};
use dynomap_model::types::TableDescription;
use dynomap_model::{DynamoDBErrorCode, DynamoDBOperation};
use tracing::info;

use super::DynamoMapper;
use crate::error::MapperResult;
use crate::exec::{self, ExecOptions};
use crate::metadata::{Record, TableMetadata};

impl DynamoMapper {
    /// Register `T` as a table.
    pub fn register_table<T: Record>(&self) -> MapperResult<Arc<TableMetadata>> {
        self.registry.register_table::<T>()
    }

    /// The metadata of `T`, registering it on first use.
    pub fn get_table_metadata<T: Record>(&self) -> MapperResult<Arc<TableMetadata>> {
        match self.registry.get_table::<T>() {
            Ok(table) => Ok(table),
            Err(_) => self.registry.register_table::<T>(),
        }
    }

    /// Every table in the store.
    pub async fn get_table_names(&self) -> MapperResult<Vec<String>> {
        exec::list_all_tables(&self.executor).await
    }

    /// The live description of `T`'s table, `None` when it does not exist.
    pub async fn get_table_description<T: Record>(&self) -> MapperResult<Option<TableDescription>> {
        let table = self.registry.get_table::<T>()?;
        let options = ExecOptions::rethrow([DynamoDBErrorCode::ResourceNotFoundException]);
        let result = self
            .executor
            .exec_with(DynamoDBOperation::DescribeTable, &table.name, &options, |transport| {
                let input = DescribeTableInput {
                    table_name: table.name.clone(),
                };
                async move { transport.describe_table(input).await }
            })
            .await;
        match result {
            Ok(out) => Ok(out.table),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create every registered table the store does not have yet, then wait
    /// for all registered tables to become active. Returns the names created.
    pub async fn create_missing_tables(&self) -> MapperResult<Vec<String>> {
        self.create_missing_tables_with(|_| {}).await
    }

    /// Like [`create_missing_tables`](Self::create_missing_tables), passing
    /// each generated request through `filter` before it is sent.
    pub async fn create_missing_tables_with(
        &self,
        filter: impl FnMut(&mut CreateTableInput),
    ) -> MapperResult<Vec<String>> {
        let tables = self.registry.tables();
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        let existing = self.get_table_names().await?;
        let missing: Vec<Arc<TableMetadata>> = tables
            .iter()
            .filter(|t| !existing.contains(&t.name))
            .cloned()
            .collect();
        let created = self.create_inputs(&missing, filter).await?;
        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        self.wait_for_tables_to_be_ready(&names).await?;
        Ok(created)
    }

    /// Create the given tables, tolerating ones that already exist, and wait
    /// for them to become active.
    pub async fn create_tables(&self, tables: &[Arc<TableMetadata>]) -> MapperResult<Vec<String>> {
        let created = self.create_inputs(tables, |_| {}).await?;
        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        self.wait_for_tables_to_be_ready(&names).await?;
        Ok(created)
    }

    async fn create_inputs(
        &self,
        tables: &[Arc<TableMetadata>],
        mut filter: impl FnMut(&mut CreateTableInput),
    ) -> MapperResult<Vec<String>> {
        let throughput = self.config.default_throughput();
        let inputs = tables
            .iter()
            .map(|t| {
                let mut input = t.create_table_input(throughput);
                filter(&mut input);
                input
            })
            .collect();
        exec::create_tables(&self.executor, inputs).await
    }

    /// Delete every table in the store and wait until they are gone.
    pub async fn delete_all_tables(&self) -> MapperResult<Vec<String>> {
        let names = self.get_table_names().await?;
        info!(count = names.len(), "deleting all tables");
        self.delete_tables(&names).await
    }

    /// Delete the named tables, tolerating missing ones, and wait until they
    /// are gone. Returns the names actually deleted.
    pub async fn delete_tables(&self, names: &[String]) -> MapperResult<Vec<String>> {
        let deleted = exec::delete_tables(&self.executor, names).await?;
        self.wait_for_tables_to_be_deleted(names).await?;
        Ok(deleted)
    }

    /// Poll until every named table and its global indexes are active.
    pub async fn wait_for_tables_to_be_ready(&self, names: &[String]) -> MapperResult<()> {
        exec::wait_for_tables_ready(
            &self.executor,
            names,
            self.config.poll_table_status,
            self.config.table_ready_timeout,
        )
        .await
    }

    /// Poll until none of the named tables is listed.
    pub async fn wait_for_tables_to_be_deleted(&self, names: &[String]) -> MapperResult<()> {
        exec::wait_for_tables_deleted(
            &self.executor,
            names,
            self.config.poll_table_status,
            self.config.table_ready_timeout,
        )
        .await
    }

    /// Create the sequence counters and every missing registered table.
    pub async fn init_schema(&self) -> MapperResult<Vec<String>> {
        self.sequences().init_schema().await?;
        self.create_missing_tables().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dynomap_model::DynamoDBError;
    use dynomap_model::types::ProvisionedThroughput;
    use serde_json::json;

    use super::*;
    use crate::builder::fixtures::Product;
    use crate::client::test_support::mapper;
    use crate::config::MapperConfig;
    use crate::error::MapperError;
    use crate::metadata::{Field, FieldType, TypeSchema};

    #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Customer {
        id: i64,
    }

    impl Record for Customer {
        fn schema() -> TypeSchema {
            TypeSchema::new("Customer").field(Field::new("Id", FieldType::Int).hash_key())
        }
    }

    fn active(name: &str) -> serde_json::Value {
        json!({"Table": {"TableName": name, "TableStatus": "ACTIVE"}})
    }

    #[tokio::test]
    async fn test_should_create_only_missing_tables() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Customer>().unwrap();
        mapper.register_table::<Product>().unwrap();
        transport.respond(DynamoDBOperation::ListTables, json!({"TableNames": ["Customer"]}));
        transport.respond(DynamoDBOperation::DescribeTable, active("Customer"));
        transport.respond(DynamoDBOperation::DescribeTable, active("Product"));

        let created = mapper
            .create_missing_tables_with(|input| {
                input.provisioned_throughput = Some(ProvisionedThroughput {
                    read_capacity_units: 1,
                    write_capacity_units: 1,
                });
            })
            .await
            .unwrap();

        assert_eq!(created, vec!["Product".to_owned()]);
        let requests = transport.requests(DynamoDBOperation::CreateTable);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["TableName"], "Product");
        assert_eq!(requests[0]["ProvisionedThroughput"]["ReadCapacityUnits"], 1);
        assert_eq!(transport.calls(DynamoDBOperation::DescribeTable), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_poll_until_created_table_is_active() {
        let (mapper, transport) = mapper(MapperConfig::default());
        let table = mapper.register_table::<Customer>().unwrap();
        transport.respond(
            DynamoDBOperation::DescribeTable,
            json!({"Table": {"TableName": "Customer", "TableStatus": "CREATING"}}),
        );
        transport.respond(DynamoDBOperation::DescribeTable, active("Customer"));

        let created = mapper.create_tables(&[table]).await.unwrap();

        assert_eq!(created, vec!["Customer".to_owned()]);
        assert_eq!(transport.calls(DynamoDBOperation::DescribeTable), 2);
    }

    #[tokio::test]
    async fn test_should_delete_every_listed_table() {
        let (mapper, transport) = mapper(MapperConfig::default());
        transport.respond(DynamoDBOperation::ListTables, json!({"TableNames": ["A", "B"]}));
        transport.respond(DynamoDBOperation::DeleteTable, json!({}));
        transport.fail(
            DynamoDBOperation::DeleteTable,
            DynamoDBError::resource_not_found("B is gone"),
        );
        transport.respond(DynamoDBOperation::ListTables, json!({"TableNames": []}));

        let deleted = mapper.delete_all_tables().await.unwrap();

        assert_eq!(deleted, vec!["A".to_owned()]);
        assert_eq!(transport.calls(DynamoDBOperation::DeleteTable), 2);
        assert_eq!(transport.calls(DynamoDBOperation::ListTables), 2);
    }

    #[tokio::test]
    async fn test_should_report_missing_table_description_as_none() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Customer>().unwrap();
        transport.fail(
            DynamoDBOperation::DescribeTable,
            DynamoDBError::resource_not_found("no such table"),
        );
        transport.respond(DynamoDBOperation::DescribeTable, active("Customer"));

        assert!(mapper.get_table_description::<Customer>().await.unwrap().is_none());
        let description = mapper.get_table_description::<Customer>().await.unwrap().unwrap();
        assert!(description.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_give_up_waiting_after_timeout() {
        let config = MapperConfig::builder()
            .poll_table_status(Duration::from_secs(1))
            .table_ready_timeout(Some(Duration::from_secs(3)))
            .build();
        let (mapper, transport) = mapper(config);
        for _ in 0..10 {
            transport.respond(
                DynamoDBOperation::DescribeTable,
                json!({"Table": {"TableName": "Slow", "TableStatus": "CREATING"}}),
            );
        }

        let err = mapper
            .wait_for_tables_to_be_ready(&["Slow".to_owned()])
            .await
            .unwrap_err();

        assert!(matches!(err, MapperError::Timeout { .. }));
    }

    #[test]
    fn test_should_register_on_first_metadata_lookup() {
        let (mapper, _) = mapper(MapperConfig::default());
        let table = mapper.get_table_metadata::<Customer>().unwrap();
        assert_eq!(table.name, "Customer");
        assert!(mapper.registry().get_table_by_name("Customer").is_some());
    }
}
