//! Schema inference: turns a [`TypeSchema`] into table metadata.
//!
//! Hash and range keys are resolved by the first rule that applies:
//!
//! 1. explicit `hash_key` / `range_key` markers;
//! 2. fields named `HashKey` / `RangeKey`;
//! 3. a single `references` field becomes the hash key, and the primary key
//!    (or the first other field) the range key;
//! 4. a `composite_key` declaration;
//! 5. a `primary_key` / `auto_increment` field, or a field named `Id`.
//!
//! Anything else is a schema error.

use std::collections::HashSet;

use dynomap_model::types::ProjectionType;

use crate::error::{MapperError, MapperResult};
use crate::metadata::field::FieldMetadata;
use crate::metadata::schema::{TypeRef, TypeSchema};
use crate::metadata::table::{IndexKind, IndexMetadata, Metadata, TableMetadata};

/// Resolve the fields of a schema without key inference.
pub(crate) fn build_fields(schema: &TypeSchema) -> MapperResult<Vec<FieldMetadata>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let name = field.alias.clone().unwrap_or_else(|| field.native_name.clone());
        if !seen.insert(name.clone()) {
            return Err(MapperError::schema(
                &schema.name,
                format!("duplicate field name {name}"),
            ));
        }
        fields.push(FieldMetadata {
            name,
            native_name: field.native_name.clone(),
            db_type: field
                .db_type
                .unwrap_or_else(|| field.field_type.default_db_type()),
            field_type: field.field_type.clone(),
            is_hash_key: false,
            is_range_key: false,
            is_auto_increment: field.auto_increment,
            is_primary_key: field.primary_key || field.auto_increment,
            exclude_null_value: field.exclude_null,
            references: field.references.clone(),
        });
    }
    Ok(fields)
}

/// Metadata of a nested type.
pub(crate) fn build_metadata(type_ref: TypeRef) -> MapperResult<Metadata> {
    let schema = type_ref.schema();
    Ok(Metadata {
        name: schema.name.clone(),
        type_ref,
        fields: build_fields(&schema)?,
    })
}

/// Positions of the hash and range key fields.
pub(crate) fn infer_keys(
    schema: &TypeSchema,
    fields: &[FieldMetadata],
) -> MapperResult<(usize, Option<usize>)> {
    let position = |name: &str| fields.iter().position(|f| f.is_named(name));
    let named = |name: &str| {
        fields.iter().position(|f| {
            f.name.eq_ignore_ascii_case(name) || f.native_name.eq_ignore_ascii_case(name)
        })
    };

    let composite = match &schema.composite_key {
        Some(names) if names.is_empty() || names.len() > 2 => {
            return Err(MapperError::schema(
                &schema.name,
                format!("composite key must name one or two fields, got {}", names.len()),
            ));
        }
        Some(names) => {
            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                let idx = position(name).ok_or_else(|| {
                    MapperError::schema(
                        &schema.name,
                        format!("composite key references unknown field {name}"),
                    )
                })?;
                resolved.push(idx);
            }
            Some(resolved)
        }
        None => None,
    };

    let marked = |pick: fn(&crate::metadata::schema::Field) -> bool, what: &str| {
        let hits: Vec<usize> = schema
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| pick(f))
            .map(|(i, _)| i)
            .collect();
        match hits.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            _ => Err(MapperError::schema(
                &schema.name,
                format!("more than one field is marked as {what}"),
            )),
        }
    };

    // 1. explicit markers
    let mut hash = marked(|f| f.hash_key, "hash key")?;
    let mut range = marked(|f| f.range_key, "range key")?;
    let has_markers = hash.is_some() || range.is_some();

    // 2. conventional names
    if hash.is_none() {
        hash = named("HashKey");
    }
    if range.is_none() {
        range = named("RangeKey");
    }

    // 3. child rows keyed by their parent's id
    if hash.is_none() && !has_markers {
        let references: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.references.is_some())
            .map(|(i, _)| i)
            .collect();
        if let [reference] = references.as_slice() {
            hash = Some(*reference);
            range = range.or_else(|| {
                fields
                    .iter()
                    .position(|f| f.is_primary_key)
                    .or_else(|| named("Id"))
                    .filter(|i| i != reference)
                    .or_else(|| (0..fields.len()).find(|i| i != reference))
            });
        }
    }

    // 4. composite key declaration
    if hash.is_none() {
        if let Some(composite) = &composite {
            hash = Some(composite[0]);
            range = range.or_else(|| composite.get(1).copied());
        }
    }

    // 5. primary key or a field named Id
    if hash.is_none() {
        hash = fields
            .iter()
            .position(|f| f.is_primary_key)
            .or_else(|| named("Id"));
    }

    let Some(hash) = hash else {
        return Err(MapperError::schema(
            &schema.name,
            "cannot determine a hash key: mark a field as hash key, primary key or name it Id",
        ));
    };
    if range == Some(hash) {
        return Err(MapperError::schema(
            &schema.name,
            format!("{} cannot be both hash and range key", fields[hash].name),
        ));
    }
    Ok((hash, range))
}

/// Build a table from its declaration.
pub(crate) fn build_table(type_ref: TypeRef) -> MapperResult<TableMetadata> {
    let schema = type_ref.schema();
    let mut fields = build_fields(&schema)?;
    let (hash, range) = infer_keys(&schema, &fields)?;
    fields[hash].is_hash_key = true;
    if let Some(range) = range {
        fields[range].is_range_key = true;
    }

    let name = schema.table_name().to_owned();
    let hash_key = fields[hash].clone();
    let range_key = range.map(|r| fields[r].clone());

    let mut table = TableMetadata {
        name,
        type_ref,
        fields,
        hash_key,
        range_key,
        local_indexes: Vec::new(),
        global_indexes: Vec::new(),
        read_capacity_units: schema.throughput.map(|t| t.0),
        write_capacity_units: schema.throughput.map(|t| t.1),
    };

    for (field, declared) in table.fields.iter().zip(&schema.fields) {
        if !declared.index {
            continue;
        }
        table.local_indexes.push(IndexMetadata {
            name: format!("{}{}Index", table.name, field.name),
            kind: IndexKind::Local,
            hash_key: table.hash_key.clone(),
            range_key: Some(field.clone()),
            projection_type: ProjectionType::Include,
            projected_fields: vec![field.name.clone()],
            read_capacity_units: None,
            write_capacity_units: None,
            index_type: None,
        });
    }

    for index_ref in &schema.local_indexes {
        let index = build_index(&table, *index_ref, IndexKind::Local)?;
        table.local_indexes.push(index);
    }
    for index_ref in &schema.global_indexes {
        let index = build_index(&table, *index_ref, IndexKind::Global)?;
        table.global_indexes.push(index);
    }

    let mut names = HashSet::new();
    for index in table.indexes() {
        if !names.insert(index.name.as_str()) {
            return Err(MapperError::schema(
                &table.name,
                format!("duplicate index name {}", index.name),
            ));
        }
    }

    Ok(table)
}

fn build_index(
    table: &TableMetadata,
    index_ref: TypeRef,
    kind: IndexKind,
) -> MapperResult<IndexMetadata> {
    let schema = index_ref.schema();
    let index_fields = build_fields(&schema)?;

    let mut table_fields = Vec::with_capacity(index_fields.len());
    for field in &index_fields {
        let resolved = table.field(&field.name).ok_or_else(|| {
            MapperError::schema(
                &schema.name,
                format!("index field {} does not exist on {}", field.name, table.name),
            )
        })?;
        table_fields.push(resolved.clone());
    }

    let (hash_key, range_key) = match kind {
        IndexKind::Local => {
            let range = match schema.fields.iter().position(|f| f.range_key) {
                Some(r) => r,
                None => infer_keys(&schema, &index_fields)?.1.ok_or_else(|| {
                    MapperError::schema(&schema.name, "a local index needs a range key")
                })?,
            };
            (table.hash_key.clone(), Some(table_fields[range].clone()))
        }
        IndexKind::Global => {
            let (hash, range) = infer_keys(&schema, &index_fields)?;
            (table_fields[hash].clone(), range.map(|r| table_fields[r].clone()))
        }
    };

    let key_names: HashSet<&str> = [&table.hash_key, &hash_key]
        .into_iter()
        .chain(table.range_key.as_ref())
        .chain(range_key.as_ref())
        .map(|f| f.name.as_str())
        .collect();
    let projected_fields: Vec<String> = table_fields
        .iter()
        .filter(|f| !key_names.contains(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect();

    let covers_table = table
        .fields
        .iter()
        .all(|f| table_fields.iter().any(|i| i.name == f.name));
    let projection_type = if covers_table {
        ProjectionType::All
    } else if projected_fields.is_empty() {
        ProjectionType::KeysOnly
    } else {
        ProjectionType::Include
    };

    let (read_capacity_units, write_capacity_units) = match (kind, schema.throughput) {
        (IndexKind::Local, _) => (None, None),
        (IndexKind::Global, Some((r, w))) => (Some(r), Some(w)),
        (IndexKind::Global, None) => (table.read_capacity_units, table.write_capacity_units),
    };

    Ok(IndexMetadata {
        name: schema.table_name().to_owned(),
        kind,
        hash_key,
        range_key,
        projection_type,
        projected_fields,
        read_capacity_units,
        write_capacity_units,
        index_type: Some(index_ref),
    })
}
