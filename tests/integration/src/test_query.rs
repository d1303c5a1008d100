//! Queries, scans and index reads against a live endpoint.

#[cfg(test)]
mod tests {
    use dynomap_core::{Field, FieldType, IndexRecord, Record, TypeSchema, dynamo, field};
    use futures::TryStreamExt;
    use serde::{Deserialize, Serialize};

    use crate::{Harness, test_table_name};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Product {
        category_id: i64,
        id: i64,
        name: String,
        price: f64,
        status: String,
    }

    impl Record for Product {
        fn schema() -> TypeSchema {
            TypeSchema::new("Product")
                .alias(test_table_name("product"))
                .field(Field::new("CategoryId", FieldType::Int).hash_key())
                .field(Field::new("Id", FieldType::Int).range_key())
                .field(Field::new("Name", FieldType::String))
                .field(Field::new("Price", FieldType::Float))
                .field(Field::new("Status", FieldType::String))
                .global_index::<ProductStatusIndex>()
                .throughput(5, 5)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct ProductStatusIndex {
        status: String,
        price: f64,
        category_id: i64,
        id: i64,
    }

    impl Record for ProductStatusIndex {
        fn schema() -> TypeSchema {
            TypeSchema::new("ProductStatusIndex")
                .field(Field::new("Status", FieldType::String).hash_key())
                .field(Field::new("Price", FieldType::Float).range_key())
                .field(Field::new("CategoryId", FieldType::Int))
                .field(Field::new("Id", FieldType::Int))
        }
    }

    impl IndexRecord for ProductStatusIndex {
        type Table = Product;
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct ProductName {
        id: i64,
        name: String,
    }

    impl Record for ProductName {
        fn schema() -> TypeSchema {
            TypeSchema::new("ProductName")
                .field(Field::new("Id", FieldType::Int))
                .field(Field::new("Name", FieldType::String))
        }
    }

    fn catalog() -> Vec<Product> {
        (1..=25)
            .map(|id| Product {
                category_id: id % 2,
                id,
                name: format!("product-{id}"),
                price: f64::from(u32::try_from(id).unwrap()) * 1.5,
                status: if id % 5 == 0 { "retired" } else { "live" }.to_owned(),
            })
            .collect()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_query_filter_and_project() {
        let harness = Harness::new("query");
        let mapper = &harness.mapper;
        mapper.register_table::<Product>().unwrap();
        mapper.init_schema().await.unwrap();
        let mut products = catalog();
        mapper.put_items(&mut products).await.unwrap();

        // Odd ids live in category 1.
        let query = mapper
            .from_query::<Product>()
            .unwrap()
            .key_condition(&field("CategoryId").eq(1).and(field("Id").between(3, 11)))
            .unwrap()
            .filter(&field("Status").eq("live"))
            .unwrap();
        let ids: Vec<i64> = mapper
            .query_all(query)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [3, 7, 9, 11]);

        let backwards = mapper
            .from_query::<Product>()
            .unwrap()
            .key_condition(&field("CategoryId").eq(0))
            .unwrap()
            .scan_index_forward(false);
        let newest = mapper.query_limit(backwards, 3).await.unwrap();
        assert_eq!(newest.iter().map(|p| p.id).collect::<Vec<_>>(), [24, 22, 20]);

        let scan = mapper
            .from_scan::<Product>()
            .unwrap()
            .filter(&dynamo::is_in(field("Id"), [2, 4, 6]))
            .unwrap();
        let mut names: Vec<ProductName> = mapper.scan_into(scan).await.unwrap();
        names.sort_by_key(|p| p.id);
        assert_eq!(names[0].name, "product-2");
        assert_eq!(names.len(), 3);

        harness.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_through_global_index() {
        let harness = Harness::new("index");
        let mapper = &harness.mapper;
        mapper.register_table::<Product>().unwrap();
        mapper.init_schema().await.unwrap();
        let mut products = catalog();
        mapper.put_items(&mut products).await.unwrap();

        let query = mapper
            .from_query_index::<ProductStatusIndex>()
            .unwrap()
            .key_condition(&field("Status").eq("retired"))
            .unwrap()
            .limit(2);
        let retired: Vec<ProductStatusIndex> =
            mapper.query(query).unwrap().try_collect().await.unwrap();

        assert_eq!(
            retired.iter().map(|p| p.id).collect::<Vec<_>>(),
            [5, 10, 15, 20, 25]
        );
        assert!(retired.windows(2).all(|w| w[0].price <= w[1].price));

        harness.cleanup().await;
    }
}
