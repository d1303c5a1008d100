//! Code-first object mapping for DynamoDB.
//!
//! Record types describe their table once through [`Record::schema`]; the
//! [`MetadataRegistry`] turns that into key, index and field metadata. The
//! [`DynamoMapper`] client converts records to and from items, compiles
//! predicates into condition expressions, and runs every request through a
//! retrying, paginating, batch-chunking harness over a [`DynamoTransport`].
//!
//! ```ignore
//! let mapper = DynamoMapper::new(transport);
//! mapper.register_table::<Customer>()?;
//! mapper.init_schema().await?;
//!
//! let mut customer = Customer { name: "Ada".into(), ..Default::default() };
//! mapper.put_item(&mut customer).await?;
//!
//! let query = mapper
//!     .from_query::<Order>()?
//!     .key_condition(&field("CustomerId").eq(customer.id))?
//!     .filter(&field("Total").gt(100))?;
//! let orders = mapper.query_all(query).await?;
//! ```
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod builder;
pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod exec;
pub mod expression;
pub mod ids;
pub mod materialize;
pub mod metadata;
pub mod sequence;
pub mod transport;

#[cfg(test)]
mod testing;

pub use builder::{QueryExpression, ScanExpression, UpdateExpression};
pub use client::DynamoMapper;
pub use config::MapperConfig;
pub use convert::Converters;
pub use error::{MapperError, MapperResult};
pub use expression::{Expr, IntoExpr, ReservedWords, dynamo, field, lit};
pub use ids::CompositeId;
pub use metadata::{
    DbType, Field, FieldType, IndexRecord, MetadataRegistry, Record, TableMetadata, TypeSchema,
};
pub use sequence::{DynamoSequenceSource, MemorySequenceSource, SequenceSource};
pub use transport::DynamoTransport;
