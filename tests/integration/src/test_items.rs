//! Item CRUD, conditional updates and batches against a live endpoint.

#[cfg(test)]
mod tests {
    use dynomap_core::{CompositeId, Field, FieldType, Record, TypeSchema, field};
    use serde::{Deserialize, Serialize};

    use crate::{Harness, test_table_name};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Customer {
        id: i64,
        name: String,
        email: Option<String>,
        visits: i64,
    }

    impl Record for Customer {
        fn schema() -> TypeSchema {
            TypeSchema::new("Customer")
                .alias(test_table_name("customer"))
                .field(Field::new("Id", FieldType::Int).hash_key().auto_increment())
                .field(Field::new("Name", FieldType::String))
                .field(Field::new("Email", FieldType::String))
                .field(Field::new("Visits", FieldType::Int))
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Visitor {
        id: i64,
        name: String,
    }

    impl Record for Visitor {
        fn schema() -> TypeSchema {
            TypeSchema::new("Visitor")
                .alias(test_table_name("visitor"))
                .field(Field::new("Id", FieldType::Int).hash_key().auto_increment())
                .field(Field::new("Name", FieldType::String))
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_get_update_and_delete_item() {
        let harness = Harness::new("items");
        let mapper = &harness.mapper;
        mapper.register_table::<Customer>().unwrap();
        mapper.init_schema().await.unwrap();

        let mut ada = Customer {
            name: "Ada".to_owned(),
            ..Customer::default()
        };
        mapper.put_item(&mut ada).await.unwrap();
        assert!(ada.id > 0, "id should be assigned from the sequence");

        let found: Customer = mapper.get_item(ada.id).await.unwrap().unwrap();
        assert_eq!(found, ada);

        let id = CompositeId::new(ada.id);
        let stale = mapper
            .update::<Customer>(&id)
            .unwrap()
            .set("Email", "ada@example.com")
            .unwrap()
            .condition(&field("Name").eq("Grace"))
            .unwrap();
        assert!(!mapper.update_item(stale).await.unwrap());

        let fresh = mapper
            .update::<Customer>(&id)
            .unwrap()
            .set("Email", "ada@example.com")
            .unwrap()
            .condition(&field("Name").eq("Ada"))
            .unwrap();
        assert!(mapper.update_item(fresh).await.unwrap());

        assert_eq!(mapper.increment::<Customer>(&id, "Visits", 2).await.unwrap(), 2);
        assert_eq!(mapper.increment::<Customer>(&id, "Visits", 3).await.unwrap(), 5);

        let old = mapper.delete_item::<Customer>(ada.id).await.unwrap().unwrap();
        assert_eq!(old.email.as_deref(), Some("ada@example.com"));
        assert_eq!(old.visits, 5);
        assert!(mapper.get_item::<Customer>(ada.id).await.unwrap().is_none());

        harness.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_batch_write_and_read_many_items() {
        let harness = Harness::new("batch");
        let mapper = &harness.mapper;
        mapper.register_table::<Visitor>().unwrap();
        mapper.init_schema().await.unwrap();

        let mut visitors: Vec<Visitor> = (0..60)
            .map(|n| Visitor {
                name: format!("visitor-{n}"),
                ..Visitor::default()
            })
            .collect();
        mapper.put_items(&mut visitors).await.unwrap();

        let mut ids: Vec<i64> = visitors.iter().map(|v| v.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 60, "every visitor should get a distinct id");

        let found: Vec<Visitor> = mapper.get_items(ids.clone()).await.unwrap();
        assert_eq!(found.len(), 60);
        assert_eq!(mapper.scan_item_count::<Visitor>().await.unwrap(), 60);

        let doomed: Vec<CompositeId> = ids[..30].iter().map(|&id| CompositeId::new(id)).collect();
        mapper.delete_items::<Visitor>(&doomed).await.unwrap();
        assert_eq!(mapper.scan_item_count::<Visitor>().await.unwrap(), 30);

        harness.cleanup().await;
    }
}
