//! Predicate AST built by callers and consumed by the compiler.
//!
//! ```
//! use dynomap_core::expression::{field, lit};
//!
//! let predicate = field("CategoryId").eq(5).and(field("Name").starts_with("foo"));
//! ```

use std::fmt;

use serde_json::Value;

/// Predicate and operand node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a field by wire or native name.
    Field(String),
    /// A constant.
    Literal(Value),
    /// A constant list of operands.
    List(Vec<Expr>),
    /// `left op right`
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Left-hand operand.
        left: Box<Expr>,
        /// Right-hand operand.
        right: Box<Expr>,
    },
    /// `left + right` or `left - right`.
    Arith {
        /// Arithmetic operator.
        op: ArithOp,
        /// Left-hand operand.
        left: Box<Expr>,
        /// Right-hand operand.
        right: Box<Expr>,
    },
    /// `left AND right` or `left OR right`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Left-hand predicate.
        left: Box<Expr>,
        /// Right-hand predicate.
        right: Box<Expr>,
    },
    /// `NOT expr`
    Not(Box<Expr>),
    /// Method call on `target`, or a free function when `target` is `None`.
    Call {
        /// The method.
        method: Method,
        /// Receiver.
        target: Option<Box<Expr>>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Property access such as `Length` or `Count`.
    Member {
        /// Receiver.
        target: Box<Expr>,
        /// Property name.
        name: String,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Arithmetic operators, valid in `SET` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Methods the compiler understands, plus [`Method::Other`] for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `begins_with(path, prefix)`
    StartsWith,
    /// `contains(path, operand)`, or `IN` when called on a constant list.
    Contains,
    /// `path IN (...)`
    In,
    /// `path BETWEEN low AND high`
    Between,
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `attribute_type(path, type)`
    AttributeType,
    /// `size(path)`
    Size,
    /// `if_not_exists(path, value)`
    IfNotExists,
    /// `list_append(a, b)`
    ListAppend,
    /// Any other method. Compiling it fails.
    Other(String),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
            Self::In => write!(f, "IN"),
            Self::Between => write!(f, "BETWEEN"),
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::Size => write!(f, "size"),
            Self::IfNotExists => write!(f, "if_not_exists"),
            Self::ListAppend => write!(f, "list_append"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Conversion into an operand. Plain values become literals.
pub trait IntoExpr {
    /// Convert.
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

macro_rules! literal_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_into_expr!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, &str, Value,
);

/// A field reference.
#[must_use]
pub fn field(name: impl Into<String>) -> Expr {
    Expr::Field(name.into())
}

/// A constant.
#[must_use]
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// A constant list.
#[must_use]
pub fn list<I, T>(items: I) -> Expr
where
    I: IntoIterator<Item = T>,
    T: IntoExpr,
{
    Expr::List(items.into_iter().map(IntoExpr::into_expr).collect())
}

/// `if_not_exists(path, value)`, for `SET` actions.
#[must_use]
pub fn if_not_exists(path: Expr, value: impl IntoExpr) -> Expr {
    Expr::Call {
        method: Method::IfNotExists,
        target: None,
        args: vec![path, value.into_expr()],
    }
}

/// `list_append(a, b)`, for `SET` actions.
#[must_use]
pub fn list_append(a: impl IntoExpr, b: impl IntoExpr) -> Expr {
    Expr::Call {
        method: Method::ListAppend,
        target: None,
        args: vec![a.into_expr(), b.into_expr()],
    }
}

/// Free-standing helpers mirroring the store's operators.
pub mod dynamo {
    use super::{Expr, IntoExpr, Method};

    /// `field IN (items...)`
    #[must_use]
    pub fn is_in<I, T>(field: Expr, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        let mut args = vec![field];
        args.extend(items.into_iter().map(IntoExpr::into_expr));
        Expr::Call {
            method: Method::In,
            target: None,
            args,
        }
    }

    /// `field BETWEEN from AND to`
    #[must_use]
    pub fn between(field: Expr, from: impl IntoExpr, to: impl IntoExpr) -> Expr {
        Expr::Call {
            method: Method::Between,
            target: None,
            args: vec![field, from.into_expr(), to.into_expr()],
        }
    }
}

impl Expr {
    fn compare(self, op: CompareOp, rhs: impl IntoExpr) -> Self {
        Self::Compare {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
        }
    }

    fn call(self, method: Method, args: Vec<Expr>) -> Self {
        Self::Call {
            method,
            target: Some(Box::new(self)),
            args,
        }
    }

    /// `self = rhs`
    #[must_use]
    pub fn eq(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Eq, rhs)
    }

    /// `self <> rhs`
    #[must_use]
    pub fn ne(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Ne, rhs)
    }

    /// `self < rhs`
    #[must_use]
    pub fn lt(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Lt, rhs)
    }

    /// `self <= rhs`
    #[must_use]
    pub fn le(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Le, rhs)
    }

    /// `self > rhs`
    #[must_use]
    pub fn gt(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Gt, rhs)
    }

    /// `self >= rhs`
    #[must_use]
    pub fn ge(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Ge, rhs)
    }

    /// `self + rhs`
    #[must_use]
    pub fn plus(self, rhs: impl IntoExpr) -> Self {
        Self::Arith {
            op: ArithOp::Plus,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
        }
    }

    /// `self - rhs`
    #[must_use]
    pub fn minus(self, rhs: impl IntoExpr) -> Self {
        Self::Arith {
            op: ArithOp::Minus,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
        }
    }

    /// `self AND rhs`
    #[must_use]
    pub fn and(self, rhs: Expr) -> Self {
        Self::Logical {
            op: LogicalOp::And,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    /// `self OR rhs`
    #[must_use]
    pub fn or(self, rhs: Expr) -> Self {
        Self::Logical {
            op: LogicalOp::Or,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    /// `begins_with(self, prefix)`
    #[must_use]
    pub fn starts_with(self, prefix: impl IntoExpr) -> Self {
        self.call(Method::StartsWith, vec![prefix.into_expr()])
    }

    /// `contains(self, item)` on a field, `item IN (...)` on a constant list.
    #[must_use]
    pub fn contains(self, item: impl IntoExpr) -> Self {
        self.call(Method::Contains, vec![item.into_expr()])
    }

    /// `self IN (items...)`
    #[must_use]
    pub fn is_in<I, T>(self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        let args = items.into_iter().map(IntoExpr::into_expr).collect();
        self.call(Method::In, args)
    }

    /// `self BETWEEN from AND to`
    #[must_use]
    pub fn between(self, from: impl IntoExpr, to: impl IntoExpr) -> Self {
        self.call(Method::Between, vec![from.into_expr(), to.into_expr()])
    }

    /// `size(self)`
    #[must_use]
    pub fn size(self) -> Self {
        self.call(Method::Size, Vec::new())
    }

    /// Property access, e.g. `Length` or `Count`.
    #[must_use]
    pub fn member(self, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// `attribute_exists(self)`
    #[must_use]
    pub fn exists(self) -> Self {
        self.call(Method::AttributeExists, Vec::new())
    }

    /// `attribute_not_exists(self)`
    #[must_use]
    pub fn not_exists(self) -> Self {
        self.call(Method::AttributeNotExists, Vec::new())
    }

    /// `attribute_type(self, type)`, with a type descriptor such as `"S"`.
    #[must_use]
    pub fn attribute_type(self, descriptor: &str) -> Self {
        self.call(Method::AttributeType, vec![lit(descriptor)])
    }

    /// Call an arbitrary method.
    #[must_use]
    pub fn method(self, name: impl Into<String>, args: Vec<Expr>) -> Self {
        self.call(Method::Other(name.into()), args)
    }

    /// Conjuncts of a chain of `AND`s, left to right.
    #[must_use]
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Self::Logical {
                op: LogicalOp::And,
                left,
                right,
            } => {
                let mut all = left.conjuncts();
                all.extend(right.conjuncts());
                all
            }
            other => vec![other],
        }
    }

    /// Returns `true` if an `OR` appears anywhere in the tree.
    #[must_use]
    pub fn has_or(&self) -> bool {
        match self {
            Self::Logical { op, left, right } => {
                *op == LogicalOp::Or || left.has_or() || right.has_or()
            }
            Self::Not(inner) => inner.has_or(),
            _ => false,
        }
    }

    /// Field names referenced anywhere in the tree, in order of appearance.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_fields(&mut names);
        names
    }

    fn collect_fields<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Field(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Self::Literal(_) => {}
            Self::List(items) => items.iter().for_each(|e| e.collect_fields(names)),
            Self::Compare { left, right, .. }
            | Self::Arith { left, right, .. }
            | Self::Logical { left, right, .. } => {
                left.collect_fields(names);
                right.collect_fields(names);
            }
            Self::Not(inner) => inner.collect_fields(names),
            Self::Call { target, args, .. } => {
                if let Some(target) = target {
                    target.collect_fields(names);
                }
                args.iter().for_each(|e| e.collect_fields(names));
            }
            Self::Member { target, .. } => target.collect_fields(names),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// `left AND right`
#[must_use]
pub fn and(left: Expr, right: Expr) -> Expr {
    left.and(right)
}

/// `left OR right`
#[must_use]
pub fn or(left: Expr, right: Expr) -> Expr {
    left.or(right)
}

/// `NOT expr`
#[must_use]
pub fn not(expr: Expr) -> Expr {
    !expr
}
