//! Cursor-driven pagination over `Query`, `Scan` and `ListTables`.

use std::sync::Arc;

use async_trait::async_trait;
use dynomap_model::input::{ListTablesInput, QueryInput, ScanInput};
use dynomap_model::types::{Item, Key};
use dynomap_model::{DynamoDBError, DynamoDBOperation};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};

use crate::error::{MapperError, MapperResult};
use crate::exec::Executor;
use crate::transport::DynamoTransport;

/// One page of a query or scan.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Items in the page.
    pub items: Vec<Item>,
    /// Items after filtering.
    pub count: i32,
    /// Items evaluated.
    pub scanned_count: i32,
    /// Cursor of the next page, empty on the last one.
    pub last_evaluated_key: Key,
}

/// A request that can be resumed from a cursor.
#[async_trait]
pub trait PagedRequest: Clone + Send + Sync + 'static {
    /// The operation issued.
    const OPERATION: DynamoDBOperation;

    /// Target table.
    fn table_name(&self) -> &str;

    /// Resume after `key`.
    fn set_exclusive_start_key(&mut self, key: Key);

    /// Issue the request once.
    async fn send(self, transport: Arc<dyn DynamoTransport>) -> Result<Page, DynamoDBError>;
}

#[async_trait]
impl PagedRequest for QueryInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Query;

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn set_exclusive_start_key(&mut self, key: Key) {
        self.exclusive_start_key = key;
    }

    async fn send(self, transport: Arc<dyn DynamoTransport>) -> Result<Page, DynamoDBError> {
        let out = transport.query(self).await?;
        Ok(Page {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
        })
    }
}

#[async_trait]
impl PagedRequest for ScanInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Scan;

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn set_exclusive_start_key(&mut self, key: Key) {
        self.exclusive_start_key = key;
    }

    async fn send(self, transport: Arc<dyn DynamoTransport>) -> Result<Page, DynamoDBError> {
        let out = transport.scan(self).await?;
        Ok(Page {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
        })
    }
}

/// Lazily fetch pages until the cursor comes back empty.
pub fn pages<R: PagedRequest>(
    executor: Executor,
    request: R,
) -> BoxStream<'static, MapperResult<Page>> {
    stream::try_unfold(Some(request), move |next| {
        let executor = executor.clone();
        async move {
            let Some(request) = next else {
                return Ok(None);
            };
            let table = request.table_name().to_owned();
            let page = executor
                .exec(R::OPERATION, &table, |transport| request.clone().send(transport))
                .await?;
            let next = if page.last_evaluated_key.is_empty() {
                None
            } else {
                let mut request = request;
                request.set_exclusive_start_key(page.last_evaluated_key.clone());
                Some(request)
            };
            Ok(Some((page, next)))
        }
    })
    .boxed()
}

/// Lazily fetch items across pages.
pub fn items<R: PagedRequest>(
    executor: Executor,
    request: R,
) -> BoxStream<'static, MapperResult<Item>> {
    pages(executor, request)
        .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<Item, MapperError>)))
        .try_flatten()
        .boxed()
}

/// Collect at most `limit` results, stopping mid-page.
pub async fn collect_limited<T, S>(stream: S, limit: usize) -> MapperResult<Vec<T>>
where
    S: Stream<Item = MapperResult<T>>,
{
    stream.take(limit).try_collect().await
}

/// Every table name, following `LastEvaluatedTableName`.
pub async fn list_all_tables(executor: &Executor) -> MapperResult<Vec<String>> {
    let mut names = Vec::new();
    let mut start: Option<String> = None;
    loop {
        let input = ListTablesInput {
            exclusive_start_table_name: start.take(),
            limit: None,
        };
        let out = executor
            .exec(DynamoDBOperation::ListTables, "", |transport| {
                let input = input.clone();
                async move { transport.list_tables(input).await }
            })
            .await?;
        names.extend(out.table_names);
        match out.last_evaluated_table_name {
            Some(name) => start = Some(name),
            None => return Ok(names),
        }
    }
}
