//! Typed request builders.
//!
//! Each builder owns one [`ExpressionContext`], so placeholders and aliases
//! stay unique across the key condition, filter, projection and update
//! clauses of a single request.

pub mod query;
pub mod scan;
pub mod update;

use std::any::TypeId;
use std::sync::Arc;

use dynomap_model::types::{ExpressionAttributeNames, ExpressionAttributeValues, Key, Select};

pub use query::QueryExpression;
pub use scan::ScanExpression;
pub use update::UpdateExpression;

use crate::config::MapperConfig;
use crate::convert::Converters;
use crate::error::{MapperError, MapperResult};
use crate::expression::{Expr, ExpressionCompiler, ExpressionContext, ReservedWords};
use crate::metadata::{IndexKind, IndexMetadata, Record, TableMetadata};

/// Prefix of value placeholders generated by the builders.
pub const PARAM_PREFIX: &str = "p";

/// State shared by query and scan builders.
#[derive(Debug, Clone)]
pub(crate) struct ReadParts {
    pub(crate) table: Arc<TableMetadata>,
    reserved: ReservedWords,
    pub(crate) ctx: ExpressionContext,
    pub(crate) index: Option<IndexMetadata>,
    filter: Option<String>,
    projection: Vec<String>,
    pub(crate) limit: Option<i32>,
    pub(crate) paging_limit: i32,
    pub(crate) consistent_read: bool,
    pub(crate) exclusive_start_key: Key,
    pub(crate) select: Option<Select>,
}

/// The rendered parts common to `Query` and `Scan` requests.
pub(crate) struct RenderedRead {
    pub(crate) index_name: Option<String>,
    pub(crate) filter_expression: Option<String>,
    pub(crate) projection_expression: Option<String>,
    pub(crate) names: ExpressionAttributeNames,
    pub(crate) values: ExpressionAttributeValues,
    pub(crate) limit: Option<i32>,
    pub(crate) consistent_read: Option<bool>,
    pub(crate) exclusive_start_key: Key,
    pub(crate) select: Option<Select>,
}

impl ReadParts {
    pub(crate) fn new(table: Arc<TableMetadata>, config: &MapperConfig) -> Self {
        Self {
            table,
            reserved: config.reserved_words.clone(),
            ctx: ExpressionContext::new(PARAM_PREFIX),
            index: None,
            filter: None,
            projection: Vec::new(),
            limit: None,
            paging_limit: config.paging_limit,
            consistent_read: config.consistent_read,
            exclusive_start_key: Key::new(),
            select: None,
        }
    }

    /// Compile `expr` into this request's context.
    pub(crate) fn compile(&mut self, expr: &Expr) -> MapperResult<(String, Vec<String>)> {
        let mut compiler = ExpressionCompiler::new(&self.table, &self.reserved, &mut self.ctx);
        let text = compiler.compile(expr)?;
        Ok((text, compiler.into_referenced_fields()))
    }

    pub(crate) fn and_filter(&mut self, expr: &Expr) -> MapperResult<()> {
        let (text, _) = self.compile(expr)?;
        self.filter = Some(match self.filter.take() {
            Some(existing) => format!("{existing} AND {text}"),
            None => text,
        });
        Ok(())
    }

    pub(crate) fn or_filter(&mut self, expr: &Expr) -> MapperResult<()> {
        let (text, _) = self.compile(expr)?;
        self.filter = Some(match self.filter.take() {
            Some(existing) => format!("({existing} OR {text})"),
            None => text,
        });
        Ok(())
    }

    /// The wire name of a field, `None` when the table has no such field.
    pub(crate) fn wire_name(&self, name: &str) -> Option<String> {
        self.table.field(name).map(|f| f.name.clone())
    }

    /// Key attribute names of the index being read, or of the table.
    pub(crate) fn key_names(&self) -> Vec<String> {
        match &self.index {
            Some(index) => index.key_names().map(str::to_owned).collect(),
            None => std::iter::once(&self.table.hash_key)
                .chain(self.table.range_key.as_ref())
                .map(|f| f.name.clone())
                .collect(),
        }
    }

    pub(crate) fn index_by_type<I: Record>(&mut self) -> MapperResult<()> {
        let index = self
            .table
            .index_by_type(TypeId::of::<I>())
            .cloned()
            .ok_or_else(|| MapperError::NotRegistered {
                type_name: std::any::type_name::<I>().to_owned(),
            })?;
        self.index = Some(index);
        Ok(())
    }

    pub(crate) fn index_named(&mut self, name: &str) -> MapperResult<()> {
        let index = self.table.index(name).cloned().ok_or_else(|| {
            MapperError::unsupported(format!("{} has no index named {name}", self.table.name))
        })?;
        self.index = Some(index);
        Ok(())
    }

    pub(crate) fn select<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = names
            .into_iter()
            .map(|n| {
                let n = n.into();
                self.wire_name(&n).unwrap_or(n)
            })
            .collect();
    }

    pub(crate) fn select_fields<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.projection = names
            .into_iter()
            .filter_map(|n| self.wire_name(n.as_ref()))
            .collect();
    }

    pub(crate) fn select_model<M: Record>(&mut self) {
        let schema = M::schema();
        let names: Vec<String> = schema
            .fields
            .iter()
            .map(|f| f.alias.clone().unwrap_or_else(|| f.native_name.clone()))
            .collect();
        self.select_fields(names);
    }

    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.limit = Some(i32::try_from(limit).unwrap_or(i32::MAX));
    }

    /// Render the shared parts. Must run after every clause is compiled.
    pub(crate) fn render(mut self, converters: &Converters) -> MapperResult<RenderedRead> {
        let projection_expression = if self.projection.is_empty() {
            None
        } else {
            let projection = std::mem::take(&mut self.projection);
            let mut compiler =
                ExpressionCompiler::new(&self.table, &self.reserved, &mut self.ctx);
            let labels: Vec<String> = projection.iter().map(|n| compiler.label(n)).collect();
            Some(labels.join(", "))
        };
        let consistent_read = match &self.index {
            Some(index) if index.kind == IndexKind::Global => None,
            _ => Some(self.consistent_read),
        };
        Ok(RenderedRead {
            index_name: self.index.map(|i| i.name),
            filter_expression: self.filter,
            projection_expression,
            names: self.ctx.attribute_names(),
            values: self.ctx.attribute_values(converters)?,
            limit: Some(self.limit.unwrap_or(self.paging_limit)),
            consistent_read,
            exclusive_start_key: self.exclusive_start_key,
            select: self.select,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde::{Deserialize, Serialize};

    use crate::metadata::{Field, FieldType, IndexRecord, Record, TypeSchema};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub(crate) struct Product {
        pub(crate) id: i64,
        pub(crate) category_id: i64,
        pub(crate) name: String,
        pub(crate) price: f64,
        pub(crate) status: String,
        pub(crate) in_stock: bool,
        pub(crate) tags: Vec<String>,
    }

    impl Record for Product {
        fn schema() -> TypeSchema {
            TypeSchema::new("Product")
                .field(Field::new("Id", FieldType::Int).hash_key())
                .field(Field::new("CategoryId", FieldType::Int).range_key())
                .field(Field::new("Name", FieldType::String).index())
                .field(Field::new("Price", FieldType::Float))
                .field(Field::new("Status", FieldType::String))
                .field(Field::new("InStock", FieldType::Bool))
                .field(Field::new("Tags", FieldType::StringSet))
                .global_index::<ProductStatusIndex>()
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub(crate) struct ProductStatusIndex {
        pub(crate) status: String,
        pub(crate) price: f64,
        pub(crate) id: i64,
    }

    impl Record for ProductStatusIndex {
        fn schema() -> TypeSchema {
            TypeSchema::new("ProductStatusIndex")
                .field(Field::new("Status", FieldType::String).hash_key())
                .field(Field::new("Price", FieldType::Float).range_key())
                .field(Field::new("Id", FieldType::Int))
        }
    }

    impl IndexRecord for ProductStatusIndex {
        type Table = Product;
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    pub(crate) struct ProductSummary {
        pub(crate) id: i64,
        pub(crate) name: String,
        pub(crate) rating: i32,
    }

    impl Record for ProductSummary {
        fn schema() -> TypeSchema {
            TypeSchema::new("ProductSummary")
                .field(Field::new("Id", FieldType::Int))
                .field(Field::new("Name", FieldType::String))
                .field(Field::new("Rating", FieldType::Int))
        }
    }
}
