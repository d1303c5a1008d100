//! Batch reads and writes chunked to the store's limits.
//!
//! Each chunk is sent once and then only its unprocessed remainder is resent,
//! with backoff, until nothing is left or the retry budget is spent.

use std::collections::HashMap;

use dynomap_model::input::{BatchGetItemInput, BatchWriteItemInput};
use dynomap_model::types::{ExpressionAttributeNames, Item, Key, KeysAndAttributes, WriteRequest};
use dynomap_model::{DynamoDBError, DynamoDBErrorCode, DynamoDBOperation};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::exec::Executor;

/// Keys per `BatchGetItem` request.
pub const MAX_READ_BATCH_SIZE: usize = 100;

/// Requests per `BatchWriteItem` request.
pub const MAX_WRITE_BATCH_SIZE: usize = 25;

/// Projection applied to a batch read.
#[derive(Debug, Clone, Default)]
pub struct BatchProjection {
    /// `ProjectionExpression`.
    pub expression: String,
    /// Aliases used by the expression.
    pub names: ExpressionAttributeNames,
}

/// Fetch items by key from one table.
pub async fn batch_get(
    executor: &Executor,
    table: &str,
    keys: Vec<Key>,
    consistent_read: bool,
    projection: Option<BatchProjection>,
) -> MapperResult<Vec<Item>> {
    let mut found = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(MAX_READ_BATCH_SIZE) {
        let (projection_expression, expression_attribute_names) = match &projection {
            Some(p) if !p.names.is_empty() => (Some(p.expression.clone()), Some(p.names.clone())),
            Some(p) => (Some(p.expression.clone()), None),
            None => (None, None),
        };
        let mut request = HashMap::from([(
            table.to_owned(),
            KeysAndAttributes {
                keys: chunk.to_vec(),
                projection_expression,
                expression_attribute_names,
                consistent_read: Some(consistent_read),
            },
        )]);
        let started = Instant::now();
        let mut attempt = 0_u32;
        loop {
            let input = BatchGetItemInput {
                request_items: request,
            };
            let mut out = executor
                .exec(DynamoDBOperation::BatchGetItem, table, |transport| {
                    let input = input.clone();
                    async move { transport.batch_get_item(input).await }
                })
                .await?;
            found.extend(out.responses.remove(table).unwrap_or_default());
            out.unprocessed_keys.retain(|_, k| !k.keys.is_empty());
            if out.unprocessed_keys.is_empty() {
                break;
            }
            let pending: usize = out.unprocessed_keys.values().map(|k| k.keys.len()).sum();
            debug!(table, pending, attempt, "resending unprocessed keys");
            backoff(executor, started, attempt, pending).await?;
            request = out.unprocessed_keys;
            attempt += 1;
        }
    }
    Ok(found)
}

/// Write puts and deletes to one table.
pub async fn batch_write(
    executor: &Executor,
    table: &str,
    requests: Vec<WriteRequest>,
) -> MapperResult<()> {
    for chunk in requests.chunks(MAX_WRITE_BATCH_SIZE) {
        let mut request = HashMap::from([(table.to_owned(), chunk.to_vec())]);
        let started = Instant::now();
        let mut attempt = 0_u32;
        loop {
            let input = BatchWriteItemInput {
                request_items: request,
            };
            let mut out = executor
                .exec(DynamoDBOperation::BatchWriteItem, table, |transport| {
                    let input = input.clone();
                    async move { transport.batch_write_item(input).await }
                })
                .await?;
            out.unprocessed_items.retain(|_, r| !r.is_empty());
            if out.unprocessed_items.is_empty() {
                break;
            }
            let pending: usize = out.unprocessed_items.values().map(Vec::len).sum();
            debug!(table, pending, attempt, "resending unprocessed items");
            backoff(executor, started, attempt, pending).await?;
            request = out.unprocessed_items;
            attempt += 1;
        }
    }
    Ok(())
}

async fn backoff(
    executor: &Executor,
    started: Instant,
    attempt: u32,
    pending: usize,
) -> MapperResult<()> {
    let policy = executor.policy();
    let elapsed = started.elapsed();
    if elapsed >= policy.timeout {
        return Err(MapperError::Timeout {
            elapsed,
            source: DynamoDBError::with_message(
                DynamoDBErrorCode::ProvisionedThroughputExceededException,
                format!("{pending} batch requests still unprocessed"),
            ),
        });
    }
    executor
        .sleep(policy.backoff(attempt).min(policy.timeout - elapsed))
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dynomap_model::AttributeValue;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::exec::RetryPolicy;
    use crate::testing::MockTransport;

    fn executor(transport: Arc<MockTransport>) -> Executor {
        Executor::new(transport, RetryPolicy::default(), CancellationToken::new())
    }

    fn key(id: usize) -> Key {
        HashMap::from([("Id".to_owned(), AttributeValue::N(id.to_string()))])
    }

    #[tokio::test]
    async fn test_should_chunk_writes_by_limit() {
        let transport = MockTransport::new();
        let requests = (0..60).map(|i| WriteRequest::delete(key(i))).collect();

        batch_write(&executor(transport.clone()), "Orders", requests)
            .await
            .unwrap();

        let sent = transport.requests(DynamoDBOperation::BatchWriteItem);
        assert_eq!(sent.len(), 3);
        let sizes: Vec<usize> = sent
            .iter()
            .map(|body| body["RequestItems"]["Orders"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[tokio::test]
    async fn test_should_chunk_reads_by_limit() {
        let transport = MockTransport::new();
        transport.respond(
            DynamoDBOperation::BatchGetItem,
            json!({"Responses": {"Orders": [{"Id": {"N": "1"}}]}}),
        );
        let keys = (0..150).map(key).collect();

        let items = batch_get(&executor(transport.clone()), "Orders", keys, true, None)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        let sent = transport.requests(DynamoDBOperation::BatchGetItem);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["RequestItems"]["Orders"]["Keys"].as_array().unwrap().len(), 100);
        assert_eq!(sent[1]["RequestItems"]["Orders"]["ConsistentRead"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_resend_only_unprocessed_items() {
        let transport = MockTransport::new();
        transport.respond(
            DynamoDBOperation::BatchWriteItem,
            json!({
                "UnprocessedItems": {
                    "Orders": [{"DeleteRequest": {"Key": {"Id": {"N": "2"}}}}]
                }
            }),
        );
        transport.respond(DynamoDBOperation::BatchWriteItem, json!({"UnprocessedItems": {}}));
        let requests = (0..3).map(|i| WriteRequest::delete(key(i))).collect();

        batch_write(&executor(transport.clone()), "Orders", requests)
            .await
            .unwrap();

        let sent = transport.requests(DynamoDBOperation::BatchWriteItem);
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1]["RequestItems"]["Orders"],
            json!([{"DeleteRequest": {"Key": {"Id": {"N": "2"}}}}])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_time_out_when_items_stay_unprocessed() {
        let transport = MockTransport::new();
        for _ in 0..200 {
            transport.respond(
                DynamoDBOperation::BatchWriteItem,
                json!({
                    "UnprocessedItems": {
                        "Orders": [{"DeleteRequest": {"Key": {"Id": {"N": "1"}}}}]
                    }
                }),
            );
        }
        let policy = RetryPolicy {
            timeout: Duration::from_secs(3),
            ..RetryPolicy::default()
        };
        let executor = Executor::new(transport, policy, CancellationToken::new());

        let err = batch_write(&executor, "Orders", vec![WriteRequest::delete(key(1))])
            .await
            .unwrap_err();

        assert_eq!(
            err.store_code(),
            Some(DynamoDBErrorCode::ProvisionedThroughputExceededException)
        );
    }
}
