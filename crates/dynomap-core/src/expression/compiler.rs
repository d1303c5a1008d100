//! Compiles an [`Expr`] into condition text with `:param` and `#alias`
//! placeholders.

use std::collections::{BTreeMap, HashMap};

use dynomap_model::AttributeValue;
use dynomap_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};
use serde_json::{Number, Value};

use crate::convert::{Converters, infer_attribute_value};
use crate::error::{MapperError, MapperResult};
use crate::expression::ReservedWords;
use crate::expression::ast::{ArithOp, CompareOp, Expr, LogicalOp, Method};
use crate::metadata::{DbType, FieldMetadata, FieldType, TableMetadata};

/// Placeholder bound to `true`.
pub const TRUE_PARAM: &str = ":true";
/// Placeholder bound to `false`.
pub const FALSE_PARAM: &str = ":false";
/// Placeholder bound to `NULL`.
pub const NULL_PARAM: &str = ":null";

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Placeholder, including the leading `:`.
    pub placeholder: String,
    /// Native value.
    pub value: Value,
    /// Type the value is converted as. Inferred from the value when `None`.
    pub value_type: Option<(FieldType, DbType)>,
}

/// Parameters and aliases shared by every clause of one request.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    prefix: String,
    params: Vec<Param>,
    aliases: BTreeMap<String, String>,
    counter: usize,
}

impl ExpressionContext {
    /// A context naming its placeholders `:{prefix}0`, `:{prefix}1`, ...
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Bound parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Alias to attribute name.
    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Bind a value and return its placeholder.
    pub fn add_param(&mut self, value: Value, value_type: Option<(FieldType, DbType)>) -> String {
        let shared = match &value {
            Value::Bool(true) => Some(TRUE_PARAM),
            Value::Bool(false) => Some(FALSE_PARAM),
            Value::Null => Some(NULL_PARAM),
            _ => None,
        };
        if let Some(placeholder) = shared {
            if !self.params.iter().any(|p| p.placeholder == placeholder) {
                self.params.push(Param {
                    placeholder: placeholder.to_owned(),
                    value,
                    value_type: None,
                });
            }
            return placeholder.to_owned();
        }

        let placeholder = format!(":{}{}", self.prefix, self.counter);
        self.counter += 1;
        self.params.push(Param {
            placeholder: placeholder.clone(),
            value,
            value_type,
        });
        placeholder
    }

    /// The alias of an attribute name, allocating one on first use.
    ///
    /// Aliases are `#` followed by the first two letters of the name in upper
    /// case. A taken alias gets a numeric suffix.
    pub fn alias_for(&mut self, name: &str) -> String {
        if let Some((alias, _)) = self.aliases.iter().find(|(_, n)| *n == name) {
            return alias.clone();
        }
        let base: String = std::iter::once('#')
            .chain(
                name.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .take(2)
                    .map(|c| c.to_ascii_uppercase()),
            )
            .collect();
        let mut alias = base.clone();
        let mut suffix = self.aliases.len();
        while self.aliases.contains_key(&alias) {
            alias = format!("{base}{suffix}");
            suffix += 1;
        }
        self.aliases.insert(alias.clone(), name.to_owned());
        alias
    }

    /// `ExpressionAttributeNames`.
    #[must_use]
    pub fn attribute_names(&self) -> ExpressionAttributeNames {
        self.aliases
            .iter()
            .map(|(alias, name)| (alias.clone(), name.clone()))
            .collect()
    }

    /// `ExpressionAttributeValues`, converted through the field types.
    pub fn attribute_values(
        &self,
        converters: &Converters,
    ) -> MapperResult<ExpressionAttributeValues> {
        let mut values = HashMap::with_capacity(self.params.len());
        for param in &self.params {
            let av = match &param.value_type {
                Some((field_type, db_type)) => {
                    converters.to_attribute_value(field_type, *db_type, &param.value)?
                }
                None if param.value.is_null() => AttributeValue::null(),
                None => infer_attribute_value(&param.value),
            };
            values.insert(param.placeholder.clone(), av);
        }
        Ok(values)
    }
}

/// The output of [`compile_filter`].
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    /// Condition text.
    pub filter_expression: String,
    /// Parameters in placeholder order.
    pub params: Vec<Param>,
    /// Alias to attribute name, for reserved words only.
    pub aliases: BTreeMap<String, String>,
    /// Distinct attribute names referenced, in order of appearance.
    pub referenced_fields: Vec<String>,
}

impl CompiledExpression {
    /// The native value bound to a placeholder.
    #[must_use]
    pub fn param(&self, placeholder: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|p| p.placeholder == placeholder)
            .map(|p| &p.value)
    }
}

/// Compile a predicate with a fresh context.
pub fn compile_filter(
    table: &TableMetadata,
    reserved: &ReservedWords,
    prefix: &str,
    expr: &Expr,
) -> MapperResult<CompiledExpression> {
    let mut ctx = ExpressionContext::new(prefix);
    let mut compiler = ExpressionCompiler::new(table, reserved, &mut ctx);
    let filter_expression = compiler.compile(expr)?;
    let referenced_fields = compiler.into_referenced_fields();
    Ok(CompiledExpression {
        filter_expression,
        params: ctx.params,
        aliases: ctx.aliases,
        referenced_fields,
    })
}

/// An operand after resolution.
enum Node<'a> {
    /// A path: a field, or `size()` of one. Carries the field for typing
    /// constants compared against it.
    Path {
        text: String,
        field: Option<&'a FieldMetadata>,
    },
    Constant(Value),
    Text(String),
}

/// Walks an [`Expr`] against one table, binding into a shared context.
#[derive(Debug)]
pub struct ExpressionCompiler<'a> {
    table: &'a TableMetadata,
    reserved: &'a ReservedWords,
    ctx: &'a mut ExpressionContext,
    referenced: Vec<String>,
}

impl<'a> ExpressionCompiler<'a> {
    /// A compiler binding into `ctx`.
    pub fn new(
        table: &'a TableMetadata,
        reserved: &'a ReservedWords,
        ctx: &'a mut ExpressionContext,
    ) -> Self {
        Self {
            table,
            reserved,
            ctx,
            referenced: Vec::new(),
        }
    }

    /// Attribute names referenced so far.
    #[must_use]
    pub fn referenced_fields(&self) -> &[String] {
        &self.referenced
    }

    /// Consume the compiler, keeping the referenced attribute names.
    #[must_use]
    pub fn into_referenced_fields(self) -> Vec<String> {
        self.referenced
    }

    /// Compile a predicate.
    pub fn compile(&mut self, expr: &Expr) -> MapperResult<String> {
        self.condition(expr)
    }

    /// Compile an operand, e.g. the right side of a `SET` action.
    pub fn compile_operand(&mut self, expr: &Expr, target: Option<&str>) -> MapperResult<String> {
        let table = self.table;
        let field = target.and_then(|name| table.field(name));
        let node = self.visit(expr)?;
        Ok(self.bind(node, field.map(typed)))
    }

    /// The label of an attribute: its alias when it needs one.
    pub fn label(&mut self, name: &str) -> String {
        let table = self.table;
        let wire = table.field(name).map_or(name, |f| f.name.as_str());
        self.label_of(wire)
    }

    fn label_of(&mut self, wire: &str) -> String {
        if !self.referenced.iter().any(|r| r == wire) {
            self.referenced.push(wire.to_owned());
        }
        if self.reserved.requires_alias(wire) {
            self.ctx.alias_for(wire)
        } else {
            wire.to_owned()
        }
    }

    fn condition(&mut self, expr: &Expr) -> MapperResult<String> {
        match self.visit(expr)? {
            Node::Text(text) => Ok(text),
            Node::Path {
                text,
                field: Some(field),
            } if field.field_type == FieldType::Bool => {
                let param = self.ctx.add_param(Value::Bool(true), None);
                Ok(format!("{text} = {param}"))
            }
            Node::Path { text, .. } => Err(MapperError::unsupported(format!(
                "{text} is not a boolean condition"
            ))),
            Node::Constant(value) => Err(MapperError::unsupported(format!(
                "constant condition {value}"
            ))),
        }
    }

    fn visit(&mut self, expr: &Expr) -> MapperResult<Node<'a>> {
        if !matches!(expr, Expr::Field(_) | Expr::Literal(_)) && expr.field_names().is_empty() {
            return eval_constant(expr).map(Node::Constant);
        }
        match expr {
            Expr::Field(name) => Ok(self.path(name)),
            Expr::Literal(value) => Ok(Node::Constant(value.clone())),
            Expr::List(_) => Err(MapperError::unsupported(
                "a list operand may only hold constants",
            )),
            Expr::Compare { op, left, right } => {
                let left = self.visit(left)?;
                let right = self.visit(right)?;
                let (left_type, right_type) = (path_type(&right), path_type(&left));
                let left = self.bind(left, left_type);
                let right = self.bind(right, right_type);
                Ok(Node::Text(format!("{left} {op} {right}")))
            }
            Expr::Arith { op, left, right } => {
                let left = self.visit(left)?;
                let right = self.visit(right)?;
                let (left_type, right_type) = (path_type(&right), path_type(&left));
                let left = self.bind(left, left_type);
                let right = self.bind(right, right_type);
                Ok(Node::Text(format!("{left} {op} {right}")))
            }
            Expr::Logical { op, left, right } => {
                let left = self.condition(left)?;
                let right = self.condition(right)?;
                Ok(Node::Text(format!("({left} {op} {right})")))
            }
            Expr::Not(inner) => {
                let inner = self.condition(inner)?;
                Ok(Node::Text(format!("NOT ({inner})")))
            }
            Expr::Member { target, name } => match name.as_str() {
                "Length" | "Count" | "len" => self.size(target),
                other => Err(MapperError::unsupported(format!(
                    "member {other} is not supported"
                ))),
            },
            Expr::Call {
                method,
                target,
                args,
            } => self.call(method, target.as_deref(), args),
        }
    }

    fn path(&mut self, name: &str) -> Node<'a> {
        let table = self.table;
        let field = table.field(name);
        let wire = field.map_or(name, |f| f.name.as_str());
        Node::Path {
            text: self.label_of(wire),
            field,
        }
    }

    fn size(&mut self, target: &Expr) -> MapperResult<Node<'a>> {
        match self.visit(target)? {
            Node::Path { text, .. } => Ok(Node::Path {
                text: format!("size({text})"),
                field: None,
            }),
            _ => Err(MapperError::unsupported("size() requires a field")),
        }
    }

    /// Render a node as operand text. Constants become parameters typed by
    /// `value_type`.
    fn bind(&mut self, node: Node<'a>, value_type: Option<(FieldType, DbType)>) -> String {
        match node {
            Node::Path { text, .. } | Node::Text(text) => text,
            Node::Constant(value) => self.ctx.add_param(value, value_type),
        }
    }

    fn call(
        &mut self,
        method: &Method,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> MapperResult<Node<'a>> {
        let mut operands: Vec<&Expr> = target.into_iter().chain(args).collect();
        match method {
            Method::StartsWith => {
                let [path, prefix] = expect_args::<2>(method, &operands)?;
                let path = self.visit(path)?;
                let ty = path_type(&path);
                let path = self.bind(path, None);
                let prefix = self.visit(prefix)?;
                let prefix = self.bind(prefix, ty);
                Ok(Node::Text(format!("begins_with({path}, {prefix})")))
            }
            Method::Contains => {
                let [haystack, needle] = expect_args::<2>(method, &operands)?;
                if haystack.field_names().is_empty() && !needle.field_names().is_empty() {
                    let items = flatten_items(eval_constant(haystack)?);
                    return self.membership(needle, items);
                }
                let haystack = self.visit(haystack)?;
                let ty = path_element_type(&haystack);
                let haystack = self.bind(haystack, None);
                let needle = self.visit(needle)?;
                let needle = self.bind(needle, ty);
                Ok(Node::Text(format!("contains({haystack}, {needle})")))
            }
            Method::In => {
                if operands.is_empty() {
                    return Err(MapperError::unsupported("IN requires a field"));
                }
                let path = operands.remove(0);
                let mut items = Vec::new();
                for item in operands {
                    items.extend(flatten_items(eval_constant(item)?));
                }
                self.membership(path, items)
            }
            Method::Between => {
                let [path, from, to] = expect_args::<3>(method, &operands)?;
                let path = self.visit(path)?;
                let ty = path_type(&path);
                let path = self.bind(path, None);
                let from = self.visit(from)?;
                let from = self.bind(from, ty.clone());
                let to = self.visit(to)?;
                let to = self.bind(to, ty);
                Ok(Node::Text(format!("{path} BETWEEN {from} AND {to}")))
            }
            Method::AttributeExists | Method::AttributeNotExists => {
                let [path] = expect_args::<1>(method, &operands)?;
                let path = self.visit(path)?;
                let path = self.bind(path, None);
                Ok(Node::Text(format!("{method}({path})")))
            }
            Method::AttributeType => {
                let [path, descriptor] = expect_args::<2>(method, &operands)?;
                let path = self.visit(path)?;
                let path = self.bind(path, None);
                let descriptor = self.visit(descriptor)?;
                let descriptor = self.bind(descriptor, None);
                Ok(Node::Text(format!("attribute_type({path}, {descriptor})")))
            }
            Method::Size => {
                let [path] = expect_args::<1>(method, &operands)?;
                self.size(path)
            }
            Method::IfNotExists => {
                let [path, value] = expect_args::<2>(method, &operands)?;
                let path = self.visit(path)?;
                let ty = path_type(&path);
                let path = self.bind(path, None);
                let value = self.visit(value)?;
                let value = self.bind(value, ty);
                Ok(Node::Text(format!("if_not_exists({path}, {value})")))
            }
            Method::ListAppend => {
                let [a, b] = expect_args::<2>(method, &operands)?;
                let a = self.visit(a)?;
                let b = self.visit(b)?;
                let (a_type, b_type) = (path_type(&b), path_type(&a));
                let a = self.bind(a, a_type);
                let b = self.bind(b, b_type);
                Ok(Node::Text(format!("list_append({a}, {b})")))
            }
            Method::Other(name) => Err(MapperError::unsupported(format!(
                "method {name} has no store equivalent"
            ))),
        }
    }

    fn membership(&mut self, path: &Expr, items: Vec<Value>) -> MapperResult<Node<'a>> {
        if items.is_empty() {
            return Err(MapperError::unsupported("IN requires at least one value"));
        }
        let path = self.visit(path)?;
        let ty = path_type(&path);
        let path = self.bind(path, None);
        let placeholders: Vec<String> = items
            .into_iter()
            .map(|item| self.ctx.add_param(item, ty.clone()))
            .collect();
        Ok(Node::Text(format!("{path} IN ({})", placeholders.join(", "))))
    }
}

fn typed(field: &FieldMetadata) -> (FieldType, DbType) {
    (field.field_type.clone(), field.db_type)
}

fn path_type(node: &Node<'_>) -> Option<(FieldType, DbType)> {
    match node {
        Node::Path {
            field: Some(field), ..
        } => Some(typed(field)),
        _ => None,
    }
}

/// The type of one element of a collection field.
fn path_element_type(node: &Node<'_>) -> Option<(FieldType, DbType)> {
    let Node::Path {
        field: Some(field), ..
    } = node
    else {
        return None;
    };
    let element = field.field_type.element_type();
    if element == field.field_type {
        return Some(typed(field));
    }
    let db_type = element.default_db_type();
    Some((element, db_type))
}

fn expect_args<'e, const N: usize>(
    method: &Method,
    operands: &[&'e Expr],
) -> MapperResult<[&'e Expr; N]> {
    <[&Expr; N]>::try_from(operands).map_err(|_| {
        MapperError::unsupported(format!(
            "{method} expects {N} operands, got {}",
            operands.len()
        ))
    })
}

fn flatten_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

// ---------------------------------------------------------------------------
// Constant folding
// ---------------------------------------------------------------------------

/// Evaluate an expression that references no fields.
pub fn eval_constant(expr: &Expr) -> MapperResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(eval_constant)
            .collect::<MapperResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Compare { op, left, right } => {
            let left = eval_constant(left)?;
            let right = eval_constant(right)?;
            compare_values(*op, &left, &right).map(Value::Bool)
        }
        Expr::Arith { op, left, right } => {
            let left = eval_constant(left)?;
            let right = eval_constant(right)?;
            arith_values(*op, &left, &right)
        }
        Expr::Logical { op, left, right } => {
            let left = as_bool(&eval_constant(left)?)?;
            let right = as_bool(&eval_constant(right)?)?;
            Ok(Value::Bool(match op {
                LogicalOp::And => left && right,
                LogicalOp::Or => left || right,
            }))
        }
        Expr::Not(inner) => Ok(Value::Bool(!as_bool(&eval_constant(inner)?)?)),
        Expr::Member { target, name } => match (eval_constant(target)?, name.as_str()) {
            (Value::String(s), "Length" | "Count" | "len") => Ok(Value::from(s.chars().count())),
            (Value::Array(items), "Length" | "Count" | "len") => Ok(Value::from(items.len())),
            (_, other) => Err(MapperError::unsupported(format!(
                "member {other} of a constant"
            ))),
        },
        Expr::Call {
            method,
            target,
            args,
        } => {
            let operands = target
                .as_deref()
                .into_iter()
                .chain(args)
                .map(eval_constant)
                .collect::<MapperResult<Vec<_>>>()?;
            match (method, operands.as_slice()) {
                (Method::StartsWith, [Value::String(s), Value::String(prefix)]) => {
                    Ok(Value::Bool(s.starts_with(prefix.as_str())))
                }
                (Method::Contains, [Value::String(s), Value::String(needle)]) => {
                    Ok(Value::Bool(s.contains(needle.as_str())))
                }
                (Method::Contains, [Value::Array(items), needle]) => {
                    Ok(Value::Bool(items.iter().any(|i| values_equal(i, needle))))
                }
                _ => Err(MapperError::unsupported(format!(
                    "cannot evaluate {method} on constants"
                ))),
            }
        }
        Expr::Field(name) => Err(MapperError::unsupported(format!(
            "field {name} in a constant expression"
        ))),
    }
}

fn as_bool(value: &Value) -> MapperResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| MapperError::unsupported(format!("{value} is not a boolean")))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => left == right,
    }
}

fn compare_values(op: CompareOp, left: &Value, right: &Value) -> MapperResult<bool> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64().partial_cmp(&r.as_f64()),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    };
    match (op, ordering) {
        (CompareOp::Eq, _) => Ok(values_equal(left, right)),
        (CompareOp::Ne, _) => Ok(!values_equal(left, right)),
        (CompareOp::Lt, Some(o)) => Ok(o == Ordering::Less),
        (CompareOp::Le, Some(o)) => Ok(o != Ordering::Greater),
        (CompareOp::Gt, Some(o)) => Ok(o == Ordering::Greater),
        (CompareOp::Ge, Some(o)) => Ok(o != Ordering::Less),
        (op, None) => Err(MapperError::unsupported(format!(
            "cannot compare {left} {op} {right}"
        ))),
    }
}

fn arith_values(op: ArithOp, left: &Value, right: &Value) -> MapperResult<Value> {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        let result = match op {
            ArithOp::Plus => l.checked_add(r),
            ArithOp::Minus => l.checked_sub(r),
        };
        if let Some(result) = result {
            return Ok(Value::from(result));
        }
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => {
            let result = match op {
                ArithOp::Plus => l + r,
                ArithOp::Minus => l - r,
            };
            Number::from_f64(result)
                .map(Value::Number)
                .ok_or_else(|| MapperError::unsupported(format!("{result} is not a number")))
        }
        _ => Err(MapperError::unsupported(format!(
            "cannot evaluate {left} {op} {right}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::expression::{dynamo, field, lit};
    use crate::metadata::{Field, MetadataRegistry, Record, TypeSchema};

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Product {
        id: i64,
        category_id: i64,
        name: String,
        in_stock: bool,
        tags: Vec<String>,
        national: String,
    }

    impl Record for Product {
        fn schema() -> TypeSchema {
            TypeSchema::new("Product")
                .field(Field::new("Id", FieldType::Int).hash_key())
                .field(Field::new("CategoryId", FieldType::Int).range_key())
                .field(Field::new("Name", FieldType::String))
                .field(Field::new("InStock", FieldType::Bool))
                .field(Field::new("Tags", FieldType::StringSet))
                .field(Field::new("National", FieldType::String))
        }
    }

    fn table() -> std::sync::Arc<TableMetadata> {
        MetadataRegistry::new().register_table::<Product>().unwrap()
    }

    #[test]
    fn test_should_compile_key_and_function_scenario() {
        let table = table();
        let expr = field("CategoryId").eq(5).and(field("Name").starts_with("foo"));
        let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();

        assert_eq!(
            compiled.filter_expression,
            "(CategoryId = :p0 AND begins_with(Name, :p1))"
        );
        assert_eq!(compiled.param(":p0"), Some(&json!(5)));
        assert_eq!(compiled.param(":p1"), Some(&json!("foo")));
        assert_eq!(compiled.referenced_fields, vec!["CategoryId", "Name"]);
        assert!(compiled.aliases.is_empty());
    }

    #[test]
    fn test_should_alias_reserved_words() {
        let table = table();
        let expr = field("Name").eq("a").and(field("Name").ne("b"));
        let compiled = compile_filter(&table, &ReservedWords::default(), "p", &expr).unwrap();

        assert_eq!(compiled.filter_expression, "(#NA = :p0 AND #NA <> :p1)");
        assert_eq!(compiled.aliases.len(), 1);
        assert_eq!(compiled.aliases["#NA"], "Name");
    }

    #[test]
    fn test_should_suffix_colliding_aliases() {
        let table = table();
        let expr = field("Name").eq("a").and(field("National").eq("b"));
        let compiled = compile_filter(&table, &ReservedWords::default(), "p", &expr).unwrap();

        assert_eq!(compiled.filter_expression, "(#NA = :p0 AND #NA1 = :p1)");
        assert_eq!(compiled.aliases["#NA1"], "National");
    }

    #[test]
    fn test_should_never_inline_literals() {
        let table = table();
        for expr in [
            field("Id").gt(42),
            field("Name").le("zzz"),
            field("CategoryId").ne(-7),
        ] {
            let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();
            assert!(compiled.filter_expression.ends_with(":p0"));
            assert_eq!(compiled.params.len(), 1);
            assert!(!compiled.filter_expression.contains("42"));
        }
    }

    #[test]
    fn test_should_expand_standalone_bool_field() {
        let table = table();
        let compiled =
            compile_filter(&table, &ReservedWords::none(), "p", &field("InStock")).unwrap();
        assert_eq!(compiled.filter_expression, "InStock = :true");
        assert_eq!(compiled.param(":true"), Some(&json!(true)));

        let err = compile_filter(&table, &ReservedWords::none(), "p", &field("Id")).unwrap_err();
        assert!(matches!(err, MapperError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_should_compile_in_and_between() {
        let table = table();
        let expr = dynamo::is_in(field("Id"), [1, 2, 3])
            .and(dynamo::between(field("CategoryId"), 10, 20));
        let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();
        assert_eq!(
            compiled.filter_expression,
            "(Id IN (:p0, :p1, :p2) AND CategoryId BETWEEN :p3 AND :p4)"
        );

        let err = compile_filter(
            &table,
            &ReservedWords::none(),
            "p",
            &field("Id").is_in(Vec::<i64>::new()),
        )
        .unwrap_err();
        assert!(matches!(err, MapperError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_should_compile_contains_on_field_and_constant_list() {
        let table = table();
        let compiled = compile_filter(
            &table,
            &ReservedWords::none(),
            "p",
            &field("Tags").contains("red"),
        )
        .unwrap();
        assert_eq!(compiled.filter_expression, "contains(Tags, :p0)");
        assert_eq!(
            compiled.params[0].value_type,
            Some((FieldType::String, DbType::String))
        );

        let compiled = compile_filter(
            &table,
            &ReservedWords::none(),
            "p",
            &lit(json!([1, 2])).contains(field("Id")),
        )
        .unwrap();
        assert_eq!(compiled.filter_expression, "Id IN (:p0, :p1)");
    }

    #[test]
    fn test_should_map_length_to_size() {
        let table = table();
        let expr = field("Tags").member("Count").gt(2);
        let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();
        assert_eq!(compiled.filter_expression, "size(Tags) > :p0");
    }

    #[test]
    fn test_should_fold_constant_operands() {
        let table = table();
        let expr = field("Id").eq(lit(40).plus(2));
        let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();
        assert_eq!(compiled.filter_expression, "Id = :p0");
        assert_eq!(compiled.param(":p0"), Some(&json!(42)));
    }

    #[test]
    fn test_should_compare_fields_without_params() {
        let table = table();
        let expr = !field("Id").eq(field("CategoryId"));
        let compiled = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap();
        assert_eq!(compiled.filter_expression, "NOT (Id = CategoryId)");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_should_reject_unknown_methods() {
        let table = table();
        let expr = field("Name").method("ToUpper", Vec::new()).eq("A");
        let err = compile_filter(&table, &ReservedWords::none(), "p", &expr).unwrap_err();
        assert!(err.to_string().contains("ToUpper"));
    }

    #[test]
    fn test_should_share_context_across_clauses() {
        let table = table();
        let reserved = ReservedWords::default();
        let mut ctx = ExpressionContext::new("p");
        let first = ExpressionCompiler::new(&table, &reserved, &mut ctx)
            .compile(&field("Id").eq(1))
            .unwrap();
        let second = ExpressionCompiler::new(&table, &reserved, &mut ctx)
            .compile(&field("Name").eq("x").and(field("InStock")))
            .unwrap();
        assert_eq!(first, "Id = :p0");
        assert_eq!(second, "(#NA = :p1 AND InStock = :true)");
        assert_eq!(ctx.params().len(), 3);
        assert_eq!(ctx.attribute_names()["#NA"], "Name");
    }

    #[test]
    fn test_should_convert_params_through_field_types() {
        let table = table();
        let registry = std::sync::Arc::new(MetadataRegistry::new());
        let converters = Converters::new(registry, &crate::config::MapperConfig::default());
        let mut ctx = ExpressionContext::new("p");
        ExpressionCompiler::new(&table, &ReservedWords::none(), &mut ctx)
            .compile(&field("Id").eq(7).and(field("InStock").eq(false)))
            .unwrap();
        let values = ctx.attribute_values(&converters).unwrap();
        assert_eq!(values[":p0"], AttributeValue::N("7".to_owned()));
        assert_eq!(values[":false"], AttributeValue::Bool(false));
    }
}
