//! `Scan` request builder.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynomap_model::input::ScanInput;
use dynomap_model::types::{Key, Select};

use crate::builder::ReadParts;
use crate::config::MapperConfig;
use crate::convert::Converters;
use crate::error::{MapperError, MapperResult};
use crate::expression::Expr;
use crate::metadata::{IndexMetadata, IndexRecord, Record, TableMetadata};

/// Builds a `Scan` over a table or one of its indexes, yielding `T`.
pub struct ScanExpression<T> {
    parts: ReadParts,
    segment: Option<(i32, i32)>,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ScanExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanExpression")
            .field("table", &self.parts.table.name)
            .field("index", &self.parts.index.as_ref().map(|i| &i.name))
            .field("segment", &self.segment)
            .finish_non_exhaustive()
    }
}

impl<T> ScanExpression<T> {
    /// A scan of `table`.
    #[must_use]
    pub fn new(table: Arc<TableMetadata>, config: &MapperConfig) -> Self {
        Self {
            parts: ReadParts::new(table, config),
            segment: None,
            _record: PhantomData,
        }
    }

    /// The table being scanned.
    #[must_use]
    pub fn table(&self) -> &Arc<TableMetadata> {
        &self.parts.table
    }

    /// The index being scanned, if any.
    #[must_use]
    pub fn index(&self) -> Option<&IndexMetadata> {
        self.parts.index.as_ref()
    }

    /// AND a condition into the filter.
    pub fn filter(mut self, expr: &Expr) -> MapperResult<Self> {
        self.parts.and_filter(expr)?;
        Ok(self)
    }

    /// OR a condition into the filter.
    pub fn or_filter(mut self, expr: &Expr) -> MapperResult<Self> {
        self.parts.or_filter(expr)?;
        Ok(self)
    }

    /// Scan the index declared by `I`.
    pub fn index_of<I: IndexRecord>(mut self) -> MapperResult<Self> {
        self.parts.index_by_type::<I>()?;
        Ok(self)
    }

    /// Scan the index called `name`.
    pub fn index_named(mut self, name: &str) -> MapperResult<Self> {
        self.parts.index_named(name)?;
        Ok(self)
    }

    /// Return only the named attributes.
    #[must_use]
    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts.select(names);
        self
    }

    /// Return only the named attributes the table knows, dropping the rest.
    #[must_use]
    pub fn select_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parts.select_fields(names);
        self
    }

    /// Return only the attributes `M` declares.
    #[must_use]
    pub fn select_model<M: Record>(mut self) -> Self {
        self.parts.select_model::<M>();
        self
    }

    /// Return the number of matches instead of the items.
    #[must_use]
    pub fn count(mut self) -> Self {
        self.parts.select = Some(Select::Count);
        self
    }

    /// Items evaluated per page.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.parts.set_limit(limit);
        self
    }

    /// Strongly consistent reads. Ignored for global indexes.
    #[must_use]
    pub fn consistent_read(mut self, consistent: bool) -> Self {
        self.parts.consistent_read = consistent;
        self
    }

    /// Resume after the given key.
    #[must_use]
    pub fn exclusive_start_key(mut self, key: Key) -> Self {
        self.parts.exclusive_start_key = key;
        self
    }

    /// Scan only `segment` of `total_segments`, for parallel scans.
    pub fn segment(mut self, segment: i32, total_segments: i32) -> MapperResult<Self> {
        if total_segments < 1 || !(0..total_segments).contains(&segment) {
            return Err(MapperError::unsupported(format!(
                "segment {segment} is outside 0..{total_segments}"
            )));
        }
        self.segment = Some((segment, total_segments));
        Ok(self)
    }

    /// Render the request.
    pub fn into_input(self, converters: &Converters) -> MapperResult<ScanInput> {
        let table_name = self.parts.table.name.clone();
        let rendered = self.parts.render(converters)?;
        Ok(ScanInput {
            table_name,
            index_name: rendered.index_name,
            filter_expression: rendered.filter_expression,
            projection_expression: rendered.projection_expression,
            expression_attribute_names: rendered.names,
            expression_attribute_values: rendered.values,
            limit: rendered.limit,
            exclusive_start_key: rendered.exclusive_start_key,
            segment: self.segment.map(|(s, _)| s),
            total_segments: self.segment.map(|(_, t)| t),
            select: rendered.select,
            consistent_read: rendered.consistent_read,
        })
    }

    /// Use `limit` as the page size unless one was set explicitly.
    pub(crate) fn page_size_at_most(mut self, limit: usize) -> Self {
        if self.parts.limit.is_none() {
            let paging_limit = usize::try_from(self.parts.paging_limit).unwrap_or(usize::MAX);
            self.parts.set_limit(limit.min(paging_limit));
        }
        self
    }

    /// Reinterpret the results as another record type.
    pub(crate) fn cast<U>(self) -> ScanExpression<U> {
        ScanExpression {
            parts: self.parts,
            segment: self.segment,
            _record: PhantomData,
        }
    }
}
