//! Process-wide registry of table and nested-type metadata.
//!
//! Readers clone an `Arc` of an immutable snapshot. Writers build the next
//! snapshot outside the lock and publish it only if nobody else published in
//! between, retrying otherwise.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::metadata::inference::{build_metadata, build_table};
use crate::metadata::schema::{FieldType, IndexRecord, Record, TypeRef};
use crate::metadata::table::{IndexMetadata, Metadata, TableMetadata};

static GLOBAL: LazyLock<Arc<MetadataRegistry>> =
    LazyLock::new(|| Arc::new(MetadataRegistry::new()));

#[derive(Debug, Clone, Default)]
struct Snapshot {
    tables: HashMap<TypeId, Arc<TableMetadata>>,
    types: HashMap<TypeId, Arc<Metadata>>,
    names: HashMap<String, TypeId>,
}

impl Snapshot {
    fn insert_table(&mut self, table: Arc<TableMetadata>) {
        let id = table.type_ref.id();
        self.names.insert(table.name.clone(), id);
        self.types.insert(
            id,
            Arc::new(Metadata {
                name: table.name.clone(),
                type_ref: table.type_ref,
                fields: table.fields.clone(),
            }),
        );
        self.tables.insert(id, table);
    }

    /// Register the record types nested in `field_type`, dependencies first.
    fn register_nested(
        &mut self,
        field_type: &FieldType,
        visiting: &mut Vec<TypeId>,
    ) -> MapperResult<()> {
        let Some(type_ref) = field_type.nested_type() else {
            return Ok(());
        };
        let id = type_ref.id();
        // a type already in progress refers back to itself
        if self.types.contains_key(&id) || visiting.contains(&id) {
            return Ok(());
        }
        visiting.push(id);
        let metadata = build_metadata(type_ref)?;
        for field in &metadata.fields {
            self.register_nested(&field.field_type, visiting)?;
        }
        visiting.pop();
        self.types.insert(id, Arc::new(metadata));
        Ok(())
    }
}

/// Registry of table metadata, keyed by Rust type.
pub struct MetadataRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("MetadataRegistry")
            .field("tables", &snapshot.tables.len())
            .field("types", &snapshot.types.len())
            .finish()
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Apply `update` to a copy of the current snapshot and publish it.
    ///
    /// `update` returns `None` when nothing needs to change.
    fn update<R>(
        &self,
        mut update: impl FnMut(&Snapshot) -> MapperResult<Option<(Snapshot, R)>>,
        unchanged: impl Fn(&Snapshot) -> R,
    ) -> MapperResult<R> {
        loop {
            let current = self.current();
            let Some((next, result)) = update(&current)? else {
                return Ok(unchanged(&current));
            };
            let mut guard = self.snapshot.write();
            if Arc::ptr_eq(&guard, &current) {
                *guard = Arc::new(next);
                return Ok(result);
            }
        }
    }

    /// Register `T` as a table. Registering twice returns the same metadata.
    pub fn register_table<T: Record>(&self) -> MapperResult<Arc<TableMetadata>> {
        self.register_table_ref(TypeRef::of::<T>())
    }

    /// Register a table by type handle.
    pub fn register_table_ref(&self, type_ref: TypeRef) -> MapperResult<Arc<TableMetadata>> {
        let id = type_ref.id();
        self.update(
            |current| {
                if current.tables.contains_key(&id) {
                    return Ok(None);
                }
                let table = Arc::new(build_table(type_ref)?);
                let mut next = current.clone();
                let mut visiting = vec![id];
                for field in &table.fields {
                    next.register_nested(&field.field_type, &mut visiting)?;
                }
                next.insert_table(Arc::clone(&table));
                debug!(table = %table.name, "registered table");
                Ok(Some((next, table)))
            },
            |current| Arc::clone(&current.tables[&id]),
        )
    }

    /// Register several tables.
    pub fn register_tables(&self, types: &[TypeRef]) -> MapperResult<Vec<Arc<TableMetadata>>> {
        types.iter().map(|t| self.register_table_ref(*t)).collect()
    }

    /// Register nested (non-table) types.
    pub fn register_types(&self, types: &[TypeRef]) -> MapperResult<()> {
        for type_ref in types {
            self.get_or_register_type(&FieldType::Record(*type_ref))?;
        }
        Ok(())
    }

    /// The metadata of the record nested in `field_type`, registering it on
    /// first use. `None` for fields that hold no record.
    pub fn get_or_register_type(
        &self,
        field_type: &FieldType,
    ) -> MapperResult<Option<Arc<Metadata>>> {
        let Some(type_ref) = field_type.nested_type() else {
            return Ok(None);
        };
        let id = type_ref.id();
        if let Some(found) = self.current().types.get(&id) {
            return Ok(Some(Arc::clone(found)));
        }
        self.update(
            |current| {
                if current.types.contains_key(&id) {
                    return Ok(None);
                }
                let mut next = current.clone();
                next.register_nested(field_type, &mut Vec::new())?;
                let metadata = Arc::clone(&next.types[&id]);
                Ok(Some((next, Some(metadata))))
            },
            |current| current.types.get(&id).cloned(),
        )
    }

    /// The metadata of table `T`.
    pub fn get_table<T: Record>(&self) -> MapperResult<Arc<TableMetadata>> {
        self.try_get_table(TypeId::of::<T>())
            .ok_or_else(|| MapperError::NotRegistered {
                type_name: std::any::type_name::<T>().to_owned(),
            })
    }

    /// The metadata of a table by type id, if registered.
    #[must_use]
    pub fn try_get_table(&self, id: TypeId) -> Option<Arc<TableMetadata>> {
        self.current().tables.get(&id).cloned()
    }

    /// The metadata of a table by store name, if registered.
    #[must_use]
    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableMetadata>> {
        let current = self.current();
        current
            .names
            .get(name)
            .and_then(|id| current.tables.get(id))
            .cloned()
    }

    /// The table and index described by index type `I`.
    pub fn get_index<I: IndexRecord>(&self) -> MapperResult<(Arc<TableMetadata>, IndexMetadata)> {
        let table = self.get_table::<I::Table>()?;
        let index = table
            .index_by_type(TypeId::of::<I>())
            .cloned()
            .ok_or_else(|| MapperError::NotRegistered {
                type_name: std::any::type_name::<I>().to_owned(),
            })?;
        Ok((table, index))
    }

    /// All registered tables, sorted by name.
    #[must_use]
    pub fn tables(&self) -> Vec<Arc<TableMetadata>> {
        let mut tables: Vec<_> = self.current().tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    /// Drop the secondary indexes of table `T`, for tables created without them.
    pub fn clear_indexes<T: Record>(&self) -> MapperResult<Arc<TableMetadata>> {
        let id = TypeId::of::<T>();
        self.get_table::<T>()?;
        self.update(
            |current| {
                let table = &current.tables[&id];
                if table.local_indexes.is_empty() && table.global_indexes.is_empty() {
                    return Ok(None);
                }
                let mut stripped = TableMetadata::clone(table);
                stripped.local_indexes.clear();
                stripped.global_indexes.clear();
                let stripped = Arc::new(stripped);
                let mut next = current.clone();
                next.insert_table(Arc::clone(&stripped));
                Ok(Some((next, stripped)))
            },
            |current| Arc::clone(&current.tables[&id]),
        )
    }
}
