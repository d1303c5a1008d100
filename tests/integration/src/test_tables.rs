//! Table lifecycle against a live endpoint.

#[cfg(test)]
mod tests {
    use dynomap_core::{Field, FieldType, Record, TypeSchema};
    use serde::{Deserialize, Serialize};

    use crate::{Harness, test_table_name};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Widget {
        sku: String,
        colour: String,
    }

    impl Record for Widget {
        fn schema() -> TypeSchema {
            TypeSchema::new("Widget")
                .alias(test_table_name("widget"))
                .field(Field::new("Sku", FieldType::String).hash_key())
                .field(Field::new("Colour", FieldType::String))
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_describe_and_delete_tables() {
        let harness = Harness::new("tables");
        let mapper = &harness.mapper;
        let table = mapper.register_table::<Widget>().unwrap();

        let created = mapper.create_missing_tables().await.unwrap();
        assert_eq!(created, vec![table.name.clone()]);
        assert!(mapper.create_missing_tables().await.unwrap().is_empty());
        assert!(mapper.get_table_names().await.unwrap().contains(&table.name));

        let description = mapper.get_table_description::<Widget>().await.unwrap().unwrap();
        assert!(description.is_active());
        assert_eq!(mapper.describe_item_count::<Widget>().await.unwrap(), 0);

        let deleted = mapper.delete_tables(&[table.name.clone()]).await.unwrap();
        assert_eq!(deleted, vec![table.name.clone()]);
        assert!(mapper.get_table_description::<Widget>().await.unwrap().is_none());

        harness.cleanup().await;
    }
}
