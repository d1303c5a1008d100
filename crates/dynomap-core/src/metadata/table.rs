//! Table, index and nested-type metadata.

use std::any::TypeId;

use dynomap_model::input::CreateTableInput;
use dynomap_model::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, LocalSecondaryIndex,
    Projection, ProjectionType, ProvisionedThroughput,
};

use crate::metadata::field::FieldMetadata;
use crate::metadata::schema::TypeRef;

/// Metadata of a nested, non-table record type.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Type name.
    pub name: String,
    /// The Rust type.
    pub type_ref: TypeRef,
    /// Declared fields.
    pub fields: Vec<FieldMetadata>,
}

impl Metadata {
    /// Look up a field by wire or native name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.is_named(name))
    }
}

/// Local or global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Shares the table's hash key.
    Local,
    /// Has its own hash key and throughput.
    Global,
}

/// A secondary index.
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    /// Index name.
    pub name: String,
    /// Local or global.
    pub kind: IndexKind,
    /// Hash key field.
    pub hash_key: FieldMetadata,
    /// Range key field.
    pub range_key: Option<FieldMetadata>,
    /// Projection type.
    pub projection_type: ProjectionType,
    /// Non-key attributes projected when the type is `INCLUDE`.
    pub projected_fields: Vec<String>,
    /// Read capacity of a global index.
    pub read_capacity_units: Option<i64>,
    /// Write capacity of a global index.
    pub write_capacity_units: Option<i64>,
    /// The type that declared this index, if any.
    pub index_type: Option<TypeRef>,
}

impl IndexMetadata {
    /// Hash and range attribute names.
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash_key.name.as_str())
            .chain(self.range_key.as_ref().map(|f| f.name.as_str()))
    }

    fn key_schema(&self) -> Vec<KeySchemaElement> {
        let mut schema = vec![KeySchemaElement::hash(&self.hash_key.name)];
        if let Some(range) = &self.range_key {
            schema.push(KeySchemaElement::range(&range.name));
        }
        schema
    }

    fn projection(&self) -> Projection {
        Projection {
            projection_type: Some(self.projection_type.clone()),
            non_key_attributes: if self.projection_type == ProjectionType::Include {
                self.projected_fields.clone()
            } else {
                Vec::new()
            },
        }
    }
}

/// A registered table.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    /// Table name on the store.
    pub name: String,
    /// The Rust type.
    pub type_ref: TypeRef,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldMetadata>,
    /// Hash key field.
    pub hash_key: FieldMetadata,
    /// Range key field.
    pub range_key: Option<FieldMetadata>,
    /// Local secondary indexes.
    pub local_indexes: Vec<IndexMetadata>,
    /// Global secondary indexes.
    pub global_indexes: Vec<IndexMetadata>,
    /// Declared read capacity.
    pub read_capacity_units: Option<i64>,
    /// Declared write capacity.
    pub write_capacity_units: Option<i64>,
}

impl TableMetadata {
    /// Look up a field by wire or native name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// All indexes, local first.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexMetadata> {
        self.local_indexes.iter().chain(&self.global_indexes)
    }

    /// Look up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMetadata> {
        self.indexes().find(|i| i.name == name)
    }

    /// The local index ranged on the given attribute.
    #[must_use]
    pub fn local_index_by_range(&self, attribute: &str) -> Option<&IndexMetadata> {
        self.local_indexes
            .iter()
            .find(|i| i.range_key.as_ref().is_some_and(|r| r.is_named(attribute)))
    }

    /// The index declared by the given type.
    #[must_use]
    pub fn index_by_type(&self, id: TypeId) -> Option<&IndexMetadata> {
        self.indexes()
            .find(|i| i.index_type.is_some_and(|t| t.id() == id))
    }

    /// Returns `true` if `name` is the table's hash or range key.
    #[must_use]
    pub fn is_key_field(&self, name: &str) -> bool {
        self.hash_key.is_named(name) || self.range_key.as_ref().is_some_and(|r| r.is_named(name))
    }

    /// Fields assigned from a sequence.
    pub fn auto_increment_fields(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|f| f.is_auto_increment)
    }

    /// The request creating this table.
    ///
    /// `default_throughput` applies to the table and to global indexes that do
    /// not declare their own.
    #[must_use]
    pub fn create_table_input(&self, default_throughput: (i64, i64)) -> CreateTableInput {
        let table_throughput = ProvisionedThroughput {
            read_capacity_units: self.read_capacity_units.unwrap_or(default_throughput.0),
            write_capacity_units: self.write_capacity_units.unwrap_or(default_throughput.1),
        };

        let mut key_schema = vec![KeySchemaElement::hash(&self.hash_key.name)];
        let mut key_fields = vec![&self.hash_key];
        if let Some(range) = &self.range_key {
            key_schema.push(KeySchemaElement::range(&range.name));
            key_fields.push(range);
        }
        for index in self.indexes() {
            key_fields.push(&index.hash_key);
            key_fields.extend(index.range_key.as_ref());
        }

        let mut attribute_definitions: Vec<AttributeDefinition> = Vec::new();
        for field in key_fields {
            if attribute_definitions.iter().any(|d| d.attribute_name == field.name) {
                continue;
            }
            if let Some(attribute_type) = field.scalar_attribute_type() {
                attribute_definitions.push(AttributeDefinition {
                    attribute_name: field.name.clone(),
                    attribute_type,
                });
            }
        }

        let local_secondary_indexes = self
            .local_indexes
            .iter()
            .map(|i| LocalSecondaryIndex {
                index_name: i.name.clone(),
                key_schema: i.key_schema(),
                projection: i.projection(),
            })
            .collect();

        let global_secondary_indexes = self
            .global_indexes
            .iter()
            .map(|i| GlobalSecondaryIndex {
                index_name: i.name.clone(),
                key_schema: i.key_schema(),
                projection: i.projection(),
                provisioned_throughput: Some(ProvisionedThroughput {
                    read_capacity_units: i
                        .read_capacity_units
                        .unwrap_or(table_throughput.read_capacity_units),
                    write_capacity_units: i
                        .write_capacity_units
                        .unwrap_or(table_throughput.write_capacity_units),
                }),
            })
            .collect();

        CreateTableInput {
            table_name: self.name.clone(),
            key_schema,
            attribute_definitions,
            billing_mode: Some(BillingMode::Provisioned),
            provisioned_throughput: Some(table_throughput),
            global_secondary_indexes,
            local_secondary_indexes,
        }
    }
}
