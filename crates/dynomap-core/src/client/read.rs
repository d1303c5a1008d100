//! Query and scan reads.

use dynomap_model::DynamoDBError;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use super::DynamoMapper;
use crate::builder::{QueryExpression, ScanExpression};
use crate::error::{MapperError, MapperResult};
use crate::exec::{self, PagedRequest};
use crate::metadata::{IndexRecord, Record, TableMetadata};

impl DynamoMapper {
    /// Start a query of `T`'s table.
    pub fn from_query<T: Record>(&self) -> MapperResult<QueryExpression<T>> {
        let table = self.registry.get_table::<T>()?;
        Ok(QueryExpression::new(table, &self.config))
    }

    /// Start a query of the index declared by `I`, yielding `I` records.
    pub fn from_query_index<I: IndexRecord>(&self) -> MapperResult<QueryExpression<I>> {
        let (table, index) = self.registry.get_index::<I>()?;
        Ok(QueryExpression::<I::Table>::new(table, &self.config)
            .index_named(&index.name)?
            .cast())
    }

    /// Start a scan of `T`'s table.
    pub fn from_scan<T: Record>(&self) -> MapperResult<ScanExpression<T>> {
        let table = self.registry.get_table::<T>()?;
        Ok(ScanExpression::new(table, &self.config))
    }

    /// Start a scan of the index declared by `I`, yielding `I` records.
    pub fn from_scan_index<I: IndexRecord>(&self) -> MapperResult<ScanExpression<I>> {
        let (table, index) = self.registry.get_index::<I>()?;
        Ok(ScanExpression::<I::Table>::new(table, &self.config)
            .index_named(&index.name)?
            .cast())
    }

    /// Lazily run a query, fetching pages as the stream is polled.
    pub fn query<T: Record>(
        &self,
        query: QueryExpression<T>,
    ) -> MapperResult<BoxStream<'static, MapperResult<T>>> {
        let table = query.table().clone();
        let input = query.into_input(&self.converters)?;
        Ok(self.records(&table, input))
    }

    /// Run a query, stopping once `limit` results are collected.
    pub async fn query_limit<T: Record>(
        &self,
        query: QueryExpression<T>,
        limit: usize,
    ) -> MapperResult<Vec<T>> {
        let stream = self.query(query.page_size_at_most(limit))?;
        exec::collect_limited(stream, limit).await
    }

    /// Run a query to exhaustion.
    pub async fn query_all<T: Record>(&self, query: QueryExpression<T>) -> MapperResult<Vec<T>> {
        self.query(query)?.try_collect().await
    }

    /// Run a query projected onto the fields `M` shares with the table.
    pub async fn query_into<M: Record, T>(
        &self,
        query: QueryExpression<T>,
    ) -> MapperResult<Vec<M>> {
        self.query_all(query.select_model::<M>().cast()).await
    }

    /// Lazily run a scan, fetching pages as the stream is polled.
    pub fn scan<T: Record>(
        &self,
        scan: ScanExpression<T>,
    ) -> MapperResult<BoxStream<'static, MapperResult<T>>> {
        let table = scan.table().clone();
        let input = scan.into_input(&self.converters)?;
        Ok(self.records(&table, input))
    }

    /// Run a scan, stopping once `limit` results are collected.
    pub async fn scan_limit<T: Record>(
        &self,
        scan: ScanExpression<T>,
        limit: usize,
    ) -> MapperResult<Vec<T>> {
        let stream = self.scan(scan.page_size_at_most(limit))?;
        exec::collect_limited(stream, limit).await
    }

    /// Run a scan to exhaustion.
    pub async fn scan_all<T: Record>(&self, scan: ScanExpression<T>) -> MapperResult<Vec<T>> {
        self.scan(scan)?.try_collect().await
    }

    /// Run a scan projected onto the fields `M` shares with the table.
    pub async fn scan_into<M: Record, T>(&self, scan: ScanExpression<T>) -> MapperResult<Vec<M>> {
        self.scan_all(scan.select_model::<M>().cast()).await
    }

    /// Count `T`'s items with a `COUNT` scan over every page.
    pub async fn scan_item_count<T: Record>(&self) -> MapperResult<i64> {
        let input = self.from_scan::<T>()?.count().into_input(&self.converters)?;
        exec::pages(self.executor.clone(), input)
            .try_fold(0_i64, |total, page| async move {
                Ok::<_, MapperError>(total + i64::from(page.count))
            })
            .await
    }

    /// The item count the store reports for `T`'s table. The store refreshes
    /// it periodically, so it may lag recent writes.
    pub async fn describe_item_count<T: Record>(&self) -> MapperResult<i64> {
        let table = self.registry.get_table::<T>()?;
        let description = self.get_table_description::<T>().await?.ok_or_else(|| {
            MapperError::Store(DynamoDBError::resource_not_found(format!(
                "table {} does not exist",
                table.name
            )))
        })?;
        Ok(description.item_count.unwrap_or(0))
    }

    fn records<T: Record, R: PagedRequest>(
        &self,
        table: &TableMetadata,
        request: R,
    ) -> BoxStream<'static, MapperResult<T>> {
        let converters = self.converters.clone();
        let fields = table.fields.clone();
        exec::items(self.executor.clone(), request)
            .map(move |item| item.and_then(|item| converters.from_item(&fields, &item)))
            .boxed()
    }
}
