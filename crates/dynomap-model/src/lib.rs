//! DynamoDB wire types for dynomap.
//!
//! Hand-written request/response shapes for the twelve DynamoDB operations the
//! object mapper drives. Every struct uses `PascalCase` field naming so that it
//! serializes directly into the `awsJson1_0` protocol body.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
