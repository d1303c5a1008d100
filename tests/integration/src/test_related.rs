//! Child rows stored under a parent id.

#[cfg(test)]
mod tests {
    use dynomap_core::{Field, FieldType, Record, TypeSchema};
    use serde::{Deserialize, Serialize};

    use crate::{Harness, test_table_name};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Comment {
        post_id: String,
        id: i64,
        body: String,
    }

    impl Record for Comment {
        fn schema() -> TypeSchema {
            TypeSchema::new("Comment")
                .alias(test_table_name("comment"))
                .field(
                    Field::new("PostId", FieldType::String)
                        .hash_key()
                        .references("Post"),
                )
                .field(Field::new("Id", FieldType::Int).range_key().auto_increment())
                .field(Field::new("Body", FieldType::String))
        }
    }

    fn comment(body: &str) -> Comment {
        Comment {
            body: body.to_owned(),
            ..Comment::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_store_and_remove_children_of_parent() {
        let harness = Harness::new("related");
        let mapper = &harness.mapper;
        mapper.register_table::<Comment>().unwrap();
        mapper.init_schema().await.unwrap();

        let mut first = vec![comment("hello"), comment("again")];
        mapper.put_related_items("post-1", &mut first).await.unwrap();
        mapper
            .put_related_item("post-2", &mut comment("elsewhere"))
            .await
            .unwrap();

        let found: Vec<Comment> = mapper.get_related_items("post-1").await.unwrap();
        assert_eq!(found, first);

        let ranges: Vec<i64> = first.iter().map(|c| c.id).collect();
        mapper
            .delete_related_items::<Comment, _>("post-1", ranges)
            .await
            .unwrap();
        assert!(
            mapper
                .get_related_items::<Comment>("post-1")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            mapper
                .get_related_items::<Comment>("post-2")
                .await
                .unwrap()
                .len(),
            1
        );

        harness.cleanup().await;
    }
}
