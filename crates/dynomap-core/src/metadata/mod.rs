//! Type metadata: record declarations, key inference and the registry.

pub mod field;
mod inference;
pub mod registry;
pub mod schema;
pub mod table;

pub use field::{DbType, FieldMetadata, is_default_value};
pub use registry::MetadataRegistry;
pub use schema::{Field, FieldType, IndexRecord, Record, TypeRef, TypeSchema};
pub use table::{IndexKind, IndexMetadata, Metadata, TableMetadata};
