//! Predicate AST, reserved words and the compiler turning predicates into
//! condition expressions.

pub mod ast;
pub mod compiler;
mod reserved;

pub use ast::{
    ArithOp, CompareOp, Expr, IntoExpr, LogicalOp, Method, and, dynamo, field, if_not_exists,
    list, list_append, lit, not, or,
};
pub use compiler::{
    CompiledExpression, ExpressionCompiler, ExpressionContext, FALSE_PARAM, NULL_PARAM, Param,
    TRUE_PARAM, compile_filter, eval_constant,
};
pub use reserved::ReservedWords;
