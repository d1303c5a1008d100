//! `UpdateItem` request builder.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynomap_model::input::UpdateItemInput;
use dynomap_model::types::{Key, ReturnValue};
use serde::Serialize;
use serde_json::Value;

use crate::builder::PARAM_PREFIX;
use crate::config::MapperConfig;
use crate::convert::Converters;
use crate::error::{MapperError, MapperResult};
use crate::expression::{Expr, ExpressionCompiler, ExpressionContext, IntoExpr, ReservedWords};
use crate::metadata::{Record, TableMetadata};

/// Builds an `UpdateItem` for one item of `T`.
///
/// `SET`, `ADD` and `REMOVE` actions accumulate independently and render in
/// that order. A condition makes the update conditional; the mapper reports a
/// failed condition as `Ok(false)`.
pub struct UpdateExpression<T> {
    table: Arc<TableMetadata>,
    reserved: ReservedWords,
    ctx: ExpressionContext,
    key: Key,
    set: Vec<String>,
    add: Vec<String>,
    remove: Vec<String>,
    condition: Option<String>,
    return_values: Option<ReturnValue>,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for UpdateExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateExpression")
            .field("table", &self.table.name)
            .field("set", &self.set)
            .field("add", &self.add)
            .field("remove", &self.remove)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

impl<T> UpdateExpression<T> {
    /// An update of the item with `key`.
    #[must_use]
    pub fn new(table: Arc<TableMetadata>, config: &MapperConfig, key: Key) -> Self {
        Self {
            table,
            reserved: config.reserved_words.clone(),
            ctx: ExpressionContext::new(PARAM_PREFIX),
            key,
            set: Vec::new(),
            add: Vec::new(),
            remove: Vec::new(),
            condition: None,
            return_values: None,
            _record: PhantomData,
        }
    }

    /// The table being updated.
    #[must_use]
    pub fn table(&self) -> &Arc<TableMetadata> {
        &self.table
    }

    /// The key of the item being updated.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    fn compiler(&mut self) -> ExpressionCompiler<'_> {
        ExpressionCompiler::new(&self.table, &self.reserved, &mut self.ctx)
    }

    fn check_not_key(&self, name: &str) -> MapperResult<()> {
        if self.table.is_key_field(name) {
            return Err(MapperError::unsupported(format!(
                "key attribute {name} cannot be updated"
            )));
        }
        Ok(())
    }

    /// `SET name = value`. The value may reference other attributes, e.g.
    /// `field("Count").plus(1)` or `if_not_exists(field("Tags"), ...)`.
    pub fn set(mut self, name: &str, value: impl IntoExpr) -> MapperResult<Self> {
        self.check_not_key(name)?;
        let value = value.into_expr();
        let mut compiler = self.compiler();
        let label = compiler.label(name);
        let operand = compiler.compile_operand(&value, Some(name))?;
        self.set.push(format!("{label} = {operand}"));
        Ok(self)
    }

    /// `SET name = value` for any serializable value.
    pub fn set_value<V: Serialize + ?Sized>(self, name: &str, value: &V) -> MapperResult<Self> {
        let value = serde_json::to_value(value)?;
        self.set(name, Expr::Literal(value))
    }

    /// `SET` the named fields from `record`; fields holding null are removed.
    pub fn set_fields<I, S>(mut self, record: &T, names: I) -> MapperResult<Self>
    where
        T: Record,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let doc = serde_json::to_value(record)?;
        for name in names {
            let name = name.as_ref();
            let field = self.table.field(name).ok_or_else(|| {
                MapperError::conversion(name, format!("{} has no such field", self.table.name))
            })?;
            let value = field.get(&doc).cloned().unwrap_or(Value::Null);
            let wire = field.name.clone();
            self = if value.is_null() {
                self.remove(&wire)?
            } else {
                self.set(&wire, Expr::Literal(value))?
            };
        }
        Ok(self)
    }

    /// `ADD name value`: increments a number or adds to a set.
    pub fn add(mut self, name: &str, value: impl IntoExpr) -> MapperResult<Self> {
        self.check_not_key(name)?;
        let value = value.into_expr();
        let mut compiler = self.compiler();
        let label = compiler.label(name);
        let operand = compiler.compile_operand(&value, Some(name))?;
        self.add.push(format!("{label} {operand}"));
        Ok(self)
    }

    /// `REMOVE name`.
    pub fn remove(mut self, name: &str) -> MapperResult<Self> {
        self.check_not_key(name)?;
        let label = self.compiler().label(name);
        self.remove.push(label);
        Ok(self)
    }

    /// AND a precondition the item must satisfy.
    pub fn condition(mut self, expr: &Expr) -> MapperResult<Self> {
        let text = self.compiler().compile(expr)?;
        self.condition = Some(match self.condition.take() {
            Some(existing) => format!("{existing} AND {text}"),
            None => text,
        });
        Ok(self)
    }

    /// What the update returns.
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.return_values = Some(return_values);
        self
    }

    /// The `SET ... ADD ... REMOVE ...` text.
    fn update_expression(&self) -> MapperResult<String> {
        let mut clauses = Vec::with_capacity(3);
        if !self.set.is_empty() {
            clauses.push(format!("SET {}", self.set.join(", ")));
        }
        if !self.add.is_empty() {
            clauses.push(format!("ADD {}", self.add.join(", ")));
        }
        if !self.remove.is_empty() {
            clauses.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        if clauses.is_empty() {
            return Err(MapperError::unsupported(
                "an update needs at least one SET, ADD or REMOVE action",
            ));
        }
        Ok(clauses.join(" "))
    }

    /// Render the request.
    pub fn into_input(self, converters: &Converters) -> MapperResult<UpdateItemInput> {
        let update_expression = self.update_expression()?;
        Ok(UpdateItemInput {
            table_name: self.table.name.clone(),
            key: self.key,
            update_expression: Some(update_expression),
            condition_expression: self.condition,
            expression_attribute_names: self.ctx.attribute_names(),
            expression_attribute_values: self.ctx.attribute_values(converters)?,
            return_values: self.return_values,
        })
    }
}
