//! Assigns sequence values to auto-increment fields before a write.
//!
//! Runs on record documents ahead of conversion. Each auto-increment field
//! receives one contiguous block covering every document that still holds a
//! default value, and records nested in lists, maps or record fields are
//! treated the same way when their type is itself a table.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::error::MapperResult;
use crate::metadata::{FieldMetadata, FieldType, MetadataRegistry, TableMetadata, is_default_value};
use crate::sequence::SequenceSource;

/// Fill unset auto-increment fields of `docs` in place.
///
/// Returns the number of ids assigned, nested records included.
pub async fn materialize_ids(
    registry: &MetadataRegistry,
    sequences: &dyn SequenceSource,
    table: &TableMetadata,
    docs: &mut [Value],
) -> MapperResult<usize> {
    materialize(registry, sequences, table, docs).await
}

fn materialize<'a>(
    registry: &'a MetadataRegistry,
    sequences: &'a dyn SequenceSource,
    table: &'a TableMetadata,
    docs: &'a mut [Value],
) -> BoxFuture<'a, MapperResult<usize>> {
    async move {
        let mut assigned = 0;

        for field in table.auto_increment_fields() {
            let pending: Vec<usize> = docs
                .iter()
                .enumerate()
                .filter(|(_, doc)| {
                    doc.is_object() && field.get(doc).is_none_or(is_default_value)
                })
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                continue;
            }
            let ids = sequences.next_sequences(&table.name, pending.len()).await?;
            debug!(table = %table.name, field = %field.name, count = ids.len(), "assigned ids");
            for (i, id) in pending.into_iter().zip(ids) {
                field.set(&mut docs[i], Value::from(id));
                assigned += 1;
            }
        }

        for field in &table.fields {
            let Some(type_ref) = field.field_type.nested_type() else {
                continue;
            };
            let Some(nested) = registry.try_get_table(type_ref.id()) else {
                continue;
            };
            if nested.auto_increment_fields().next().is_none() {
                continue;
            }

            let mut slots: Vec<&mut Value> = docs
                .iter_mut()
                .flat_map(|doc| nested_slots(field, doc))
                .collect();
            if slots.is_empty() {
                continue;
            }
            let mut values: Vec<Value> =
                slots.iter_mut().map(|s| std::mem::take(&mut **s)).collect();
            let result = materialize(registry, sequences, &nested, &mut values).await;
            for (slot, value) in slots.into_iter().zip(values) {
                *slot = value;
            }
            assigned += result?;
        }

        Ok(assigned)
    }
    .boxed()
}

/// The record documents held directly by `field` in `doc`.
fn nested_slots<'d>(field: &FieldMetadata, doc: &'d mut Value) -> Vec<&'d mut Value> {
    let Some(value) = doc.get_mut(&field.native_name) else {
        return Vec::new();
    };
    let holds_records = |inner: &FieldType| matches!(inner, FieldType::Record(_));
    match &field.field_type {
        FieldType::Record(_) if value.is_object() => vec![value],
        FieldType::List(inner) if holds_records(inner) => match value {
            Value::Array(items) => items.iter_mut().filter(|v| v.is_object()).collect(),
            _ => Vec::new(),
        },
        FieldType::Map(inner) if holds_records(inner) => match value {
            Value::Object(entries) => entries.values_mut().filter(|v| v.is_object()).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::metadata::{Field, Record, TypeSchema};
    use crate::sequence::MemorySequenceSource;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct OrderLine {
        id: i64,
        sku: String,
    }

    impl Record for OrderLine {
        fn schema() -> TypeSchema {
            TypeSchema::new("OrderLine")
                .field(Field::new("Id", FieldType::Int).auto_increment())
                .field(Field::new("Sku", FieldType::String))
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Order {
        id: i64,
        lines: Vec<OrderLine>,
    }

    impl Record for Order {
        fn schema() -> TypeSchema {
            TypeSchema::new("Order")
                .field(Field::new("Id", FieldType::Int).auto_increment())
                .field(Field::new(
                    "Lines",
                    FieldType::list(FieldType::record::<OrderLine>()),
                ))
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Shipment {
        id: i64,
        primary: OrderLine,
        by_sku: std::collections::BTreeMap<String, OrderLine>,
    }

    impl Record for Shipment {
        fn schema() -> TypeSchema {
            TypeSchema::new("Shipment")
                .field(Field::new("Id", FieldType::Int).hash_key())
                .field(Field::new("Primary", FieldType::record::<OrderLine>()))
                .field(Field::new(
                    "BySku",
                    FieldType::map(FieldType::record::<OrderLine>()),
                ))
        }
    }

    #[tokio::test]
    async fn test_should_assign_one_block_to_unset_ids() {
        let registry = MetadataRegistry::new();
        let table = registry.register_table::<Order>().unwrap();
        let sequences = MemorySequenceSource::new();
        sequences.reset("Order", 10).await.unwrap();

        let mut docs = vec![
            json!({"Id": 0, "Lines": []}),
            json!({"Id": 99, "Lines": []}),
            json!({"Id": 0, "Lines": []}),
        ];
        let assigned = materialize_ids(&registry, &sequences, &table, &mut docs)
            .await
            .unwrap();

        assert_eq!(assigned, 2);
        assert_eq!(docs[0]["Id"], json!(11));
        assert_eq!(docs[1]["Id"], json!(99));
        assert_eq!(docs[2]["Id"], json!(12));
        assert_eq!(sequences.current("Order").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_should_assign_nested_table_ids_across_records() {
        let registry = MetadataRegistry::new();
        registry.register_table::<OrderLine>().unwrap();
        let table = registry.register_table::<Order>().unwrap();
        let sequences = MemorySequenceSource::new();

        let mut docs = vec![
            json!({"Id": 5, "Lines": [{"Id": 0, "Sku": "a"}, {"Id": 0, "Sku": "b"}]}),
            json!({"Id": 6, "Lines": [{"Id": 0, "Sku": "c"}]}),
        ];
        let assigned = materialize_ids(&registry, &sequences, &table, &mut docs)
            .await
            .unwrap();

        assert_eq!(assigned, 3);
        assert_eq!(docs[0]["Lines"][0], json!({"Id": 1, "Sku": "a"}));
        assert_eq!(docs[0]["Lines"][1]["Id"], json!(2));
        assert_eq!(docs[1]["Lines"][0]["Id"], json!(3));
        assert_eq!(sequences.current("OrderLine").await.unwrap(), 3);
        assert_eq!(sequences.current("Order").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_should_leave_nested_records_of_non_tables_alone() {
        let registry = MetadataRegistry::new();
        let table = registry.register_table::<Order>().unwrap();
        let sequences = MemorySequenceSource::new();

        let mut docs = vec![json!({"Id": 1, "Lines": [{"Id": 0, "Sku": "a"}]})];
        let assigned = materialize_ids(&registry, &sequences, &table, &mut docs)
            .await
            .unwrap();

        assert_eq!(assigned, 0);
        assert_eq!(docs[0]["Lines"][0]["Id"], json!(0));
    }

    #[tokio::test]
    async fn test_should_assign_ids_in_record_and_map_fields() {
        let registry = MetadataRegistry::new();
        registry.register_table::<OrderLine>().unwrap();
        let table = registry.register_table::<Shipment>().unwrap();
        let sequences = MemorySequenceSource::new();

        let mut docs = vec![json!({
            "Id": 1,
            "Primary": {"Id": 0, "Sku": "a"},
            "BySku": {"b": {"Id": 0, "Sku": "b"}, "c": {"Id": 0, "Sku": "c"}, "d": "skip"}
        })];
        let assigned = materialize_ids(&registry, &sequences, &table, &mut docs)
            .await
            .unwrap();

        assert_eq!(assigned, 3);
        let mut ids = vec![
            docs[0]["Primary"]["Id"].as_i64().unwrap(),
            docs[0]["BySku"]["b"]["Id"].as_i64().unwrap(),
            docs[0]["BySku"]["c"]["Id"].as_i64().unwrap(),
        ];
        ids.sort_unstable();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(docs[0]["BySku"]["d"], json!("skip"));
    }
}
