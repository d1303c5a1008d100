//! Single and batch item access.

use std::sync::Arc;

use dynomap_model::input::{DeleteItemInput, GetItemInput, PutItemInput, UpdateItemInput};
use dynomap_model::output::UpdateItemOutput;
use dynomap_model::types::{Item, Key, ReturnValue, WriteRequest};
use dynomap_model::{DynamoDBErrorCode, DynamoDBOperation};
use serde::Serialize;
use serde_json::Value;

use super::DynamoMapper;
use crate::builder::UpdateExpression;
use crate::error::{MapperError, MapperResult};
use crate::exec::{self, ExecOptions};
use crate::ids::CompositeId;
use crate::materialize::materialize_ids;
use crate::metadata::{Record, TableMetadata};

impl DynamoMapper {
    /// Fetch the item of a hash-keyed table.
    pub async fn get_item<T: Record>(&self, hash: impl Serialize) -> MapperResult<Option<T>> {
        self.get_item_by_id(&CompositeId::from_parts(&hash, None::<&()>)?)
            .await
    }

    /// Fetch the item of a hash and range keyed table.
    pub async fn get_item_with_range<T: Record>(
        &self,
        hash: impl Serialize,
        range: impl Serialize,
    ) -> MapperResult<Option<T>> {
        self.get_item_by_id(&CompositeId::from_parts(&hash, Some(&range))?)
            .await
    }

    /// Fetch an item by id.
    pub async fn get_item_by_id<T: Record>(&self, id: &CompositeId) -> MapperResult<Option<T>> {
        let table = self.registry.get_table::<T>()?;
        let input = GetItemInput {
            table_name: table.name.clone(),
            key: self.key_of(&table, id)?,
            consistent_read: Some(self.config.consistent_read),
            ..GetItemInput::default()
        };
        let out = self
            .executor
            .exec(DynamoDBOperation::GetItem, &table.name, |transport| {
                let input = input.clone();
                async move { transport.get_item(input).await }
            })
            .await?;
        out.item
            .map(|item| self.converters.from_item(&table.fields, &item))
            .transpose()
    }

    /// Fetch the items of a hash-keyed table. Missing items are skipped and
    /// the order of the result is unspecified.
    pub async fn get_items<T, H>(&self, hashes: impl IntoIterator<Item = H>) -> MapperResult<Vec<T>>
    where
        T: Record,
        H: Serialize,
    {
        let ids = hashes
            .into_iter()
            .map(|hash| CompositeId::from_parts(&hash, None::<&()>))
            .collect::<MapperResult<Vec<_>>>()?;
        self.get_items_by_ids(&ids).await
    }

    /// Fetch items by id in batches.
    pub async fn get_items_by_ids<T: Record>(&self, ids: &[CompositeId]) -> MapperResult<Vec<T>> {
        let table = self.registry.get_table::<T>()?;
        let keys = self.keys_of(&table, ids)?;
        let items = exec::batch_get(
            &self.executor,
            &table.name,
            keys,
            self.config.consistent_read,
            None,
        )
        .await?;
        self.decode_all(&table, &items)
    }

    /// Write `item`, first assigning any unset auto-increment fields. The
    /// assigned ids are written back into `item`.
    pub async fn put_item<T: Record>(&self, item: &mut T) -> MapperResult<()> {
        self.put(item, None).await?;
        Ok(())
    }

    /// Like [`put_item`](Self::put_item), returning the item it replaced.
    pub async fn put_item_returning_old<T: Record>(&self, item: &mut T) -> MapperResult<Option<T>> {
        let old = self.put(item, Some(ReturnValue::AllOld)).await?;
        let table = self.registry.get_table::<T>()?;
        self.decode_optional(&table, &old)
    }

    async fn put<T: Record>(
        &self,
        item: &mut T,
        return_values: Option<ReturnValue>,
    ) -> MapperResult<Item> {
        let table = self.registry.get_table::<T>()?;
        let mut items = self.prepare_puts(&table, std::slice::from_mut(item)).await?;
        let input = PutItemInput {
            table_name: table.name.clone(),
            item: items.pop().unwrap_or_default(),
            return_values,
            ..PutItemInput::default()
        };
        let out = self
            .executor
            .exec(DynamoDBOperation::PutItem, &table.name, |transport| {
                let input = input.clone();
                async move { transport.put_item(input).await }
            })
            .await?;
        Ok(out.attributes)
    }

    /// Write many items in batches. Unset auto-increment fields across all of
    /// them are filled from one sequence block.
    pub async fn put_items<T: Record>(&self, items: &mut [T]) -> MapperResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let table = self.registry.get_table::<T>()?;
        let requests = self
            .prepare_puts(&table, items)
            .await?
            .into_iter()
            .map(WriteRequest::put)
            .collect();
        exec::batch_write(&self.executor, &table.name, requests).await
    }

    /// Materialize ids, write them back, and convert each record to an item.
    async fn prepare_puts<T: Record>(
        &self,
        table: &TableMetadata,
        items: &mut [T],
    ) -> MapperResult<Vec<Item>> {
        let mut docs = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        let sequences = self.sequences();
        let assigned = materialize_ids(&self.registry, sequences.as_ref(), table, &mut docs).await?;
        if assigned > 0 {
            for (item, doc) in items.iter_mut().zip(&docs) {
                *item = serde_json::from_value(doc.clone())?;
            }
        }
        docs.iter()
            .map(|doc| self.converters.to_item(&table.fields, doc))
            .collect()
    }

    /// Delete the item of a hash-keyed table, returning it if it existed.
    pub async fn delete_item<T: Record>(&self, hash: impl Serialize) -> MapperResult<Option<T>> {
        self.delete_item_by_id(&CompositeId::from_parts(&hash, None::<&()>)?)
            .await
    }

    /// Delete an item by id, returning it if it existed.
    pub async fn delete_item_by_id<T: Record>(&self, id: &CompositeId) -> MapperResult<Option<T>> {
        let table = self.registry.get_table::<T>()?;
        let input = DeleteItemInput {
            table_name: table.name.clone(),
            key: self.key_of(&table, id)?,
            return_values: Some(ReturnValue::AllOld),
            ..DeleteItemInput::default()
        };
        let out = self
            .executor
            .exec(DynamoDBOperation::DeleteItem, &table.name, |transport| {
                let input = input.clone();
                async move { transport.delete_item(input).await }
            })
            .await?;
        self.decode_optional(&table, &out.attributes)
    }

    /// Delete items by id in batches.
    pub async fn delete_items<T: Record>(&self, ids: &[CompositeId]) -> MapperResult<()> {
        let table = self.registry.get_table::<T>()?;
        let requests = self
            .keys_of(&table, ids)?
            .into_iter()
            .map(WriteRequest::delete)
            .collect();
        exec::batch_write(&self.executor, &table.name, requests).await
    }

    /// Start an update of the item with `id`.
    pub fn update<T: Record>(&self, id: &CompositeId) -> MapperResult<UpdateExpression<T>> {
        let table = self.registry.get_table::<T>()?;
        let key = self.key_of(&table, id)?;
        Ok(UpdateExpression::new(table, &self.config, key))
    }

    /// Apply an update. Returns `Ok(false)` when its condition does not hold.
    pub async fn update_item<T>(&self, update: UpdateExpression<T>) -> MapperResult<bool> {
        let input = update.into_input(&self.converters)?;
        match self.send_update(input).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_conditional_check_failed() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `SET` every non-key field of `record` holding a non-default value,
    /// leaving the others untouched. Returns the item as it was before.
    pub async fn update_item_non_defaults<T: Record>(&self, record: &T) -> MapperResult<Option<T>> {
        let table = self.registry.get_table::<T>()?;
        let doc = serde_json::to_value(record)?;
        let key = self.converters.key_from_doc(&table, &doc)?;
        let names: Vec<String> = self
            .converters
            .to_non_default_attributes(&table, &doc)?
            .into_iter()
            .map(|(field, _)| field.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        let input = UpdateExpression::<T>::new(Arc::clone(&table), &self.config, key)
            .set_fields(record, &names)?
            .return_values(ReturnValue::AllOld)
            .into_input(&self.converters)?;
        let out = self.send_update(input).await?;
        self.decode_optional(&table, &out.attributes)
    }

    /// Atomically add `amount` to a numeric field and return its new value.
    pub async fn increment<T: Record>(
        &self,
        id: &CompositeId,
        field: &str,
        amount: i64,
    ) -> MapperResult<i64> {
        let update = self.update::<T>(id)?;
        let wire = update
            .table()
            .field(field)
            .map_or_else(|| field.to_owned(), |f| f.name.clone());
        let input = update
            .add(&wire, amount)?
            .return_values(ReturnValue::UpdatedNew)
            .into_input(&self.converters)?;
        let out = self.send_update(input).await?;
        match out.attributes.get(&wire) {
            None => Ok(0),
            Some(value) => value
                .as_n()
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| {
                    MapperError::conversion(&wire, "incremented value is not an integer")
                }),
        }
    }

    async fn send_update(&self, input: UpdateItemInput) -> MapperResult<UpdateItemOutput> {
        let options = ExecOptions::rethrow([DynamoDBErrorCode::ConditionalCheckFailedException]);
        let table = input.table_name.clone();
        self.executor
            .exec_with(DynamoDBOperation::UpdateItem, &table, &options, |transport| {
                let input = input.clone();
                async move { transport.update_item(input).await }
            })
            .await
    }

    fn keys_of(&self, table: &TableMetadata, ids: &[CompositeId]) -> MapperResult<Vec<Key>> {
        ids.iter().map(|id| self.key_of(table, id)).collect()
    }

    pub(super) fn decode_all<T: Record>(
        &self,
        table: &TableMetadata,
        items: &[Item],
    ) -> MapperResult<Vec<T>> {
        items
            .iter()
            .map(|item| self.converters.from_item(&table.fields, item))
            .collect()
    }

    fn decode_optional<T: Record>(
        &self,
        table: &TableMetadata,
        item: &Item,
    ) -> MapperResult<Option<T>> {
        if item.is_empty() {
            return Ok(None);
        }
        self.converters.from_item(&table.fields, item).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use dynomap_model::DynamoDBError;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::builder::fixtures::Product;
    use crate::client::test_support::mapper;
    use crate::config::MapperConfig;
    use crate::expression::field;
    use crate::metadata::{Field, FieldType, TypeSchema};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Order {
        id: i64,
        name: String,
        views: i64,
    }

    impl Record for Order {
        fn schema() -> TypeSchema {
            TypeSchema::new("Order")
                .field(Field::new("Id", FieldType::Int).hash_key().auto_increment())
                .field(Field::new("Name", FieldType::String))
                .field(Field::new("Views", FieldType::Int))
        }
    }

    fn order(name: &str) -> Order {
        Order {
            name: name.to_owned(),
            ..Order::default()
        }
    }

    #[tokio::test]
    async fn test_should_assign_id_before_put() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();

        let mut first = order("first");
        mapper.put_item(&mut first).await.unwrap();

        assert_eq!(first.id, 1);
        let request = &transport.requests(DynamoDBOperation::PutItem)[0];
        assert_eq!(request["TableName"], "Order");
        assert_eq!(request["Item"]["Id"], json!({"N": "1"}));
        assert_eq!(request["Item"]["Name"], json!({"S": "first"}));
    }

    #[tokio::test]
    async fn test_should_batch_puts_with_one_sequence_block() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();
        let mut orders: Vec<Order> = (0..30).map(|i| order(&format!("o{i}"))).collect();
        orders[3].id = 500;

        mapper.put_items(&mut orders).await.unwrap();

        assert_eq!(transport.calls(DynamoDBOperation::BatchWriteItem), 2);
        assert_eq!(orders[0].id, 1);
        assert_eq!(orders[3].id, 500);
        assert_eq!(orders[29].id, 29);
        assert_eq!(mapper.sequences().current("Order").await.unwrap(), 29);
        let requests = transport.requests(DynamoDBOperation::BatchWriteItem);
        assert_eq!(requests[0]["RequestItems"]["Order"].as_array().unwrap().len(), 25);
        assert_eq!(requests[1]["RequestItems"]["Order"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_should_get_item_with_consistent_read() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Product>().unwrap();
        transport.respond(
            DynamoDBOperation::GetItem,
            json!({"Item": {
                "Id": {"N": "1"},
                "CategoryId": {"N": "2"},
                "Name": {"S": "lamp"},
                "InStock": {"BOOL": true}
            }}),
        );

        let found: Product = mapper.get_item_with_range(1, 2).await.unwrap().unwrap();
        let missing: Option<Product> = mapper.get_item_with_range(1, 3).await.unwrap();

        assert_eq!(found.name, "lamp");
        assert!(found.in_stock);
        assert!(missing.is_none());
        let request = &transport.requests(DynamoDBOperation::GetItem)[0];
        assert_eq!(request["ConsistentRead"], true);
        assert_eq!(request["Key"], json!({"Id": {"N": "1"}, "CategoryId": {"N": "2"}}));
    }

    #[tokio::test]
    async fn test_should_get_items_in_batches() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();
        transport.respond(
            DynamoDBOperation::BatchGetItem,
            json!({"Responses": {"Order": [{"Id": {"N": "1"}, "Name": {"S": "a"}}]}}),
        );
        transport.respond(
            DynamoDBOperation::BatchGetItem,
            json!({"Responses": {"Order": [{"Id": {"N": "150"}, "Name": {"S": "b"}}]}}),
        );

        let found: Vec<Order> = mapper.get_items(1..=150).await.unwrap();

        assert_eq!(transport.calls(DynamoDBOperation::BatchGetItem), 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].name, "b");
    }

    #[tokio::test]
    async fn test_should_report_failed_condition_as_false() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();
        transport.fail(
            DynamoDBOperation::UpdateItem,
            DynamoDBError::conditional_check_failed("The conditional request failed"),
        );

        let id = CompositeId::new(7);
        let rejected = mapper
            .update::<Order>(&id)
            .unwrap()
            .set("Name", "renamed")
            .unwrap()
            .condition(&field("Views").gt(10))
            .unwrap();
        assert!(!mapper.update_item(rejected).await.unwrap());

        let accepted = mapper.update::<Order>(&id).unwrap().remove("Name").unwrap();
        assert!(mapper.update_item(accepted).await.unwrap());
        assert_eq!(transport.calls(DynamoDBOperation::UpdateItem), 2);
    }

    #[tokio::test]
    async fn test_should_update_only_non_default_fields() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Product>().unwrap();
        transport.respond(
            DynamoDBOperation::UpdateItem,
            json!({
                "Attributes": {"Id": {"N": "1"}, "CategoryId": {"N": "2"}, "Name": {"S": "old"}}
            }),
        );
        let product = Product {
            id: 1,
            category_id: 2,
            name: "new".to_owned(),
            ..Product::default()
        };

        let old = mapper.update_item_non_defaults(&product).await.unwrap().unwrap();

        assert_eq!(old.name, "old");
        let request = &transport.requests(DynamoDBOperation::UpdateItem)[0];
        assert_eq!(request["UpdateExpression"], "SET #NA = :p0");
        assert_eq!(request["ReturnValues"], "ALL_OLD");
        assert_eq!(request["ExpressionAttributeValues"][":p0"], json!({"S": "new"}));
    }

    #[tokio::test]
    async fn test_should_increment_and_return_new_value() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();
        transport.respond(
            DynamoDBOperation::UpdateItem,
            json!({"Attributes": {"Views": {"N": "12"}}}),
        );

        let views = mapper
            .increment::<Order>(&CompositeId::new(3), "Views", 2)
            .await
            .unwrap();

        assert_eq!(views, 12);
        let request = &transport.requests(DynamoDBOperation::UpdateItem)[0];
        assert_eq!(request["UpdateExpression"], "ADD #VI :p0");
        assert_eq!(request["ExpressionAttributeNames"]["#VI"], "Views");
        assert_eq!(request["ReturnValues"], "UPDATED_NEW");
    }

    #[tokio::test]
    async fn test_should_return_deleted_item() {
        let (mapper, transport) = mapper(MapperConfig::default());
        mapper.register_table::<Order>().unwrap();
        transport.respond(
            DynamoDBOperation::DeleteItem,
            json!({"Attributes": {"Id": {"N": "4"}, "Name": {"S": "gone"}}}),
        );

        let deleted: Order = mapper.delete_item(4).await.unwrap().unwrap();
        let absent: Option<Order> = mapper.delete_item(5).await.unwrap();

        assert_eq!(deleted.name, "gone");
        assert!(absent.is_none());
        mapper
            .delete_items::<Order>(&[CompositeId::new(1), CompositeId::new(2)])
            .await
            .unwrap();
        let batch = &transport.requests(DynamoDBOperation::BatchWriteItem)[0];
        assert_eq!(
            batch["RequestItems"]["Order"][1]["DeleteRequest"]["Key"]["Id"],
            json!({"N": "2"})
        );
    }
}
