//! Child rows stored under their parent's id.
//!
//! A related table has a hash key holding the parent id and a range key
//! identifying the child within it.

use serde::Serialize;

use super::DynamoMapper;
use crate::error::{MapperError, MapperResult};
use crate::expression::field;
use crate::ids::CompositeId;
use crate::metadata::{Record, TableMetadata};

fn check_related(table: &TableMetadata) -> MapperResult<()> {
    if table.range_key.is_none() {
        return Err(MapperError::schema(
            &table.name,
            "related tables need both a hash key and a range key",
        ));
    }
    Ok(())
}

impl DynamoMapper {
    /// Write `item` under the parent `hash`.
    pub async fn put_related_item<T: Record>(
        &self,
        hash: impl Serialize,
        item: &mut T,
    ) -> MapperResult<()> {
        self.put_related_items(hash, std::slice::from_mut(item)).await
    }

    /// Write `items` under the parent `hash`.
    pub async fn put_related_items<T: Record>(
        &self,
        hash: impl Serialize,
        items: &mut [T],
    ) -> MapperResult<()> {
        let table = self.registry.get_table::<T>()?;
        check_related(&table)?;
        let parent = serde_json::to_value(hash)?;
        for item in items.iter_mut() {
            table.hash_key.write(item, parent.clone())?;
        }
        self.put_items(items).await
    }

    /// Every child row of the parent `hash`.
    pub async fn get_related_items<T: Record>(&self, hash: impl Serialize) -> MapperResult<Vec<T>> {
        let table = self.registry.get_table::<T>()?;
        let parent = serde_json::to_value(hash)?;
        let query = self
            .from_query::<T>()?
            .key_condition(&field(table.hash_key.name.as_str()).eq(parent))?;
        self.query_all(query).await
    }

    /// Delete the children of `hash` with the given range keys.
    pub async fn delete_related_items<T, R>(
        &self,
        hash: impl Serialize,
        ranges: impl IntoIterator<Item = R>,
    ) -> MapperResult<()>
    where
        T: Record,
        R: Serialize,
    {
        let table = self.registry.get_table::<T>()?;
        check_related(&table)?;
        let ids = ranges
            .into_iter()
            .map(|range| CompositeId::from_parts(&hash, Some(&range)))
            .collect::<MapperResult<Vec<_>>>()?;
        self.delete_items::<T>(&ids).await
    }
}
