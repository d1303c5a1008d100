//! The boundary between the mapper and a DynamoDB endpoint.
//!
//! A transport only has to move JSON bodies: [`DynamoTransport::send`] takes
//! an operation and its serialized input and returns the serialized output.
//! The typed operation methods are provided on top of it, so an in-process
//! fake, an HTTP client and a recording test double all plug in the same way.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use dynomap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, CreateTableInput, DeleteItemInput, DeleteTableInput,
    DescribeTableInput, GetItemInput, ListTablesInput, PutItemInput, QueryInput, ScanInput,
    UpdateItemInput,
};
use dynomap_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput,
    DeleteTableOutput, DescribeTableOutput, GetItemOutput, ListTablesOutput, PutItemOutput,
    QueryOutput, ScanOutput, UpdateItemOutput,
};
use dynomap_model::{DynamoDBError, DynamoDBOperation};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Sends operations to a DynamoDB endpoint.
#[async_trait]
pub trait DynamoTransport: Send + Sync + fmt::Debug {
    /// Send one request body and return the response body.
    async fn send(&self, op: DynamoDBOperation, body: Bytes) -> Result<Bytes, DynamoDBError>;

    /// `CreateTable`
    async fn create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::CreateTable, encode(&input)?).await?)
    }

    /// `DeleteTable`
    async fn delete_table(
        &self,
        input: DeleteTableInput,
    ) -> Result<DeleteTableOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::DeleteTable, encode(&input)?).await?)
    }

    /// `DescribeTable`
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::DescribeTable, encode(&input)?).await?)
    }

    /// `ListTables`
    async fn list_tables(&self, input: ListTablesInput) -> Result<ListTablesOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::ListTables, encode(&input)?).await?)
    }

    /// `PutItem`
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::PutItem, encode(&input)?).await?)
    }

    /// `GetItem`
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::GetItem, encode(&input)?).await?)
    }

    /// `UpdateItem`
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::UpdateItem, encode(&input)?).await?)
    }

    /// `DeleteItem`
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::DeleteItem, encode(&input)?).await?)
    }

    /// `Query`
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::Query, encode(&input)?).await?)
    }

    /// `Scan`
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::Scan, encode(&input)?).await?)
    }

    /// `BatchGetItem`
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::BatchGetItem, encode(&input)?).await?)
    }

    /// `BatchWriteItem`
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        decode(&self.send(DynamoDBOperation::BatchWriteItem, encode(&input)?).await?)
    }
}

/// Serialize a request body.
pub fn encode<T: Serialize>(input: &T) -> Result<Bytes, DynamoDBError> {
    serde_json::to_vec(input).map(Bytes::from).map_err(|e| {
        DynamoDBError::serialization_exception(format!("failed to serialize request: {e}"))
            .with_source(e)
    })
}

/// Deserialize a response body. An empty body decodes as `{}`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, DynamoDBError> {
    let body = if body.is_empty() { b"{}".as_slice() } else { body };
    serde_json::from_slice(body).map_err(|e| {
        DynamoDBError::serialization_exception(format!("failed to deserialize response: {e}"))
            .with_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn test_should_round_trip_typed_operation_through_send() {
        let transport = MockTransport::new();
        transport.respond(
            DynamoDBOperation::ListTables,
            serde_json::json!({"TableNames": ["Orders"], "LastEvaluatedTableName": "Orders"}),
        );

        let out = transport
            .list_tables(ListTablesInput {
                limit: Some(1),
                ..ListTablesInput::default()
            })
            .await
            .unwrap();

        assert_eq!(out.table_names, vec!["Orders"]);
        assert_eq!(out.last_evaluated_table_name.as_deref(), Some("Orders"));
        assert_eq!(
            transport.requests(DynamoDBOperation::ListTables)[0]["Limit"],
            1
        );
    }

    #[test]
    fn test_should_decode_empty_body_as_default() {
        let out: PutItemOutput = decode(b"").unwrap();
        assert!(out.attributes.is_empty());
        let err = decode::<PutItemOutput>(b"not json").unwrap_err();
        assert_eq!(err.code, dynomap_model::DynamoDBErrorCode::SerializationException);
    }
}
