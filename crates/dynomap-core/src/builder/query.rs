//! `Query` request builder.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynomap_model::input::QueryInput;
use dynomap_model::types::{Key, Select};

use crate::builder::ReadParts;
use crate::config::MapperConfig;
use crate::convert::Converters;
use crate::error::{MapperError, MapperResult};
use crate::expression::{CompareOp, Expr, Method};
use crate::metadata::{IndexMetadata, IndexRecord, Record, TableMetadata};

/// Builds a `Query` over a table or one of its indexes, yielding `T`.
///
/// Conditions on key attributes go into the key condition, everything else
/// into the filter applied after it.
///
/// ```ignore
/// let q = mapper
///     .from_query::<Product>()?
///     .key_condition(&field("Id").eq(7))?
///     .filter(&field("Price").gt(10))?
///     .limit(20);
/// ```
pub struct QueryExpression<T> {
    parts: ReadParts,
    key_conditions: Vec<String>,
    scan_index_forward: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for QueryExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExpression")
            .field("table", &self.parts.table.name)
            .field("index", &self.parts.index.as_ref().map(|i| &i.name))
            .field("key_conditions", &self.key_conditions)
            .field("scan_index_forward", &self.scan_index_forward)
            .finish_non_exhaustive()
    }
}

impl<T> QueryExpression<T> {
    /// A query over `table`.
    #[must_use]
    pub fn new(table: Arc<TableMetadata>, config: &MapperConfig) -> Self {
        Self {
            parts: ReadParts::new(table, config),
            key_conditions: Vec::new(),
            scan_index_forward: config.scan_index_forward,
            _record: PhantomData,
        }
    }

    /// The table being queried.
    #[must_use]
    pub fn table(&self) -> &Arc<TableMetadata> {
        &self.parts.table
    }

    /// The index being queried, if any.
    #[must_use]
    pub fn index(&self) -> Option<&IndexMetadata> {
        self.parts.index.as_ref()
    }

    /// Add a condition on key attributes. `OR` is not allowed.
    ///
    /// The hash key only takes `=`; the range key also takes `<`, `<=`, `>`,
    /// `>=`, `BETWEEN` and `begins_with`.
    pub fn key_condition(mut self, expr: &Expr) -> MapperResult<Self> {
        if expr.has_or() {
            return Err(MapperError::unsupported("key conditions cannot use OR"));
        }
        for conjunct in expr.conjuncts() {
            self.check_key_fields(conjunct)?;
            if !self.is_key_operator(conjunct) {
                return Err(MapperError::unsupported(format!(
                    "operator on {} cannot be a key condition of {}",
                    conjunct.field_names().join(", "),
                    self.target_name()
                )));
            }
            let (text, _) = self.parts.compile(conjunct)?;
            self.key_conditions.push(text);
        }
        Ok(self)
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

    /// Split a predicate into key condition and filter.
    ///
    /// Conjuncts that only reference key attributes with an operator a key
    /// condition accepts become key conditions. An `OR` mixing key attributes
    /// with others cannot be expressed and is rejected.
    pub fn matching(mut self, expr: &Expr) -> MapperResult<Self> {
        let keys = self.parts.key_names();
        for conjunct in expr.conjuncts() {
            let wire: Vec<String> = conjunct
                .field_names()
                .into_iter()
                .map(|n| self.parts.wire_name(n).unwrap_or_else(|| n.to_owned()))
                .collect();
            let key_refs = wire.iter().filter(|n| keys.contains(n)).count();
            if conjunct.has_or() {
                if key_refs > 0 {
                    return Err(MapperError::unsupported(format!(
                        "OR over key attributes cannot be filtered: {}",
                        wire.join(", ")
                    )));
                }
                self.parts.and_filter(conjunct)?;
            } else if key_refs > 0 && key_refs == wire.len() && self.is_key_operator(conjunct) {
                let (text, _) = self.parts.compile(conjunct)?;
                self.key_conditions.push(text);
            } else {
                self.parts.and_filter(conjunct)?;
            }
        }
        Ok(self)
    }

    /// Query the local index ranged on the single field `expr` references,
    /// using `expr` as its range condition.
    pub fn local_index(mut self, expr: &Expr) -> MapperResult<Self> {
        let fields: Vec<String> = expr
            .field_names()
            .into_iter()
            .map(|n| self.parts.wire_name(n).unwrap_or_else(|| n.to_owned()))
            .collect();
        if fields.is_empty() {
            return Err(MapperError::unsupported("no field to pick an index by"));
        }
        if fields.len() != 1 {
            return Err(MapperError::AmbiguousIndex { fields });
        }
        let name = &fields[0];
        let index = self
            .parts
            .table
            .local_index_by_range(name)
            .cloned()
            .ok_or_else(|| {
                MapperError::unsupported(format!(
                    "{} has no local index on {name}",
                    self.parts.table.name
                ))
            })?;
        self.parts.index = Some(index);
        self.key_condition(expr)
    }

    /// Query the index declared by `I`.
    pub fn index_of<I: IndexRecord>(mut self) -> MapperResult<Self> {
        self.parts.index_by_type::<I>()?;
        Ok(self)
    }

    /// Query the index called `name`.
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

    /// Ascending (`true`) or descending range key order.
    #[must_use]
    pub fn scan_index_forward(mut self, forward: bool) -> Self {
        self.scan_index_forward = forward;
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

    /// Render the request.
    pub fn into_input(self, converters: &Converters) -> MapperResult<QueryInput> {
        if self.key_conditions.is_empty() {
            return Err(MapperError::unsupported(
                "a query needs a condition on the hash key",
            ));
        }
        let table_name = self.parts.table.name.clone();
        let rendered = self.parts.render(converters)?;
        Ok(QueryInput {
            table_name,
            index_name: rendered.index_name,
            key_condition_expression: Some(self.key_conditions.join(" AND ")),
            filter_expression: rendered.filter_expression,
            projection_expression: rendered.projection_expression,
            expression_attribute_names: rendered.names,
            expression_attribute_values: rendered.values,
            scan_index_forward: Some(self.scan_index_forward),
            limit: rendered.limit,
            exclusive_start_key: rendered.exclusive_start_key,
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
    pub(crate) fn cast<U>(self) -> QueryExpression<U> {
        QueryExpression {
            parts: self.parts,
            key_conditions: self.key_conditions,
            scan_index_forward: self.scan_index_forward,
            _record: PhantomData,
        }
    }

    fn check_key_fields(&self, expr: &Expr) -> MapperResult<()> {
        let keys = self.parts.key_names();
        for name in expr.field_names() {
            let wire = self.parts.wire_name(name).unwrap_or_else(|| name.to_owned());
            if !keys.contains(&wire) {
                return Err(MapperError::unsupported(format!(
                    "{wire} is not a key of {}",
                    self.target_name()
                )));
            }
        }
        Ok(())
    }

    fn is_key_operator(&self, expr: &Expr) -> bool {
        let Some((name, shape)) = key_shape(expr) else {
            return false;
        };
        let wire = self.parts.wire_name(name).unwrap_or_else(|| name.to_owned());
        let hash = match &self.parts.index {
            Some(index) => &index.hash_key.name,
            None => &self.parts.table.hash_key.name,
        };
        wire != *hash || shape == KeyShape::Equality
    }

    fn target_name(&self) -> &str {
        self.parts
            .index
            .as_ref()
            .map_or(self.parts.table.name.as_str(), |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyShape {
    Equality,
    Range,
}

/// The key attribute and operator kind of a conjunct, if a key condition can
/// express it.
fn key_shape(expr: &Expr) -> Option<(&str, KeyShape)> {
    let constant = |e: &Expr| e.field_names().is_empty();
    match expr {
        Expr::Compare { op, left, right } => {
            let name = match (left.as_ref(), right.as_ref()) {
                (Expr::Field(name), other) | (other, Expr::Field(name)) if constant(other) => {
                    name.as_str()
                }
                _ => return None,
            };
            match op {
                CompareOp::Eq => Some((name, KeyShape::Equality)),
                CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                    Some((name, KeyShape::Range))
                }
                CompareOp::Ne => None,
            }
        }
        Expr::Call {
            method: Method::Between | Method::StartsWith,
            target,
            args,
        } => {
            let (subject, rest) = match target {
                Some(target) => (target.as_ref(), args.as_slice()),
                None => args.split_first()?,
            };
            match subject {
                Expr::Field(name) if rest.iter().all(constant) => {
                    Some((name.as_str(), KeyShape::Range))
                }
                _ => None,
            }
        }
        _ => None,
    }
}
