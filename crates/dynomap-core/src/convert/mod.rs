//! Conversion between record documents and attribute values.
//!
//! A conversion is resolved in order by the global hook, the converter
//! registered for the field's kind (`DateTime`, `Enum` or a custom name) and
//! finally the built-in rules for the field's [`DbType`].

mod builtin;
mod datetime;
mod enums;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dynomap_model::AttributeValue;
use dynomap_model::types::{Item, Key};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use builtin::{infer_attribute_value, infer_native_value};
pub use datetime::DateTimeConverter;
pub use enums::EnumConverter;

use crate::config::MapperConfig;
use crate::error::{MapperError, MapperResult};
use crate::metadata::{
    DbType, FieldMetadata, FieldType, MetadataRegistry, TableMetadata, is_default_value,
};

/// Converts one kind of field.
pub trait ValueConverter: Send + Sync + fmt::Debug {
    /// Native value to attribute value.
    fn to_attribute_value(
        &self,
        field_type: &FieldType,
        db_type: DbType,
        value: &Value,
    ) -> MapperResult<AttributeValue>;

    /// Attribute value to native value.
    fn from_attribute_value(
        &self,
        field_type: &FieldType,
        value: &AttributeValue,
    ) -> MapperResult<Value>;
}

/// Global override of native to attribute conversion. `None` falls through.
pub type ToAttributeHook =
    Arc<dyn Fn(&FieldType, DbType, &Value) -> Option<AttributeValue> + Send + Sync>;

/// Global override of attribute to native conversion. `None` falls through.
pub type FromAttributeHook =
    Arc<dyn Fn(&FieldType, &AttributeValue) -> Option<Value> + Send + Sync>;

/// The converter set used by a mapper. Cheap to clone; clones share
/// registered converters and hooks.
#[derive(Clone)]
pub struct Converters {
    registry: Arc<MetadataRegistry>,
    exclude_null_values: bool,
    converters: Arc<RwLock<HashMap<String, Arc<dyn ValueConverter>>>>,
    to_hook: Arc<RwLock<Option<ToAttributeHook>>>,
    from_hook: Arc<RwLock<Option<FromAttributeHook>>>,
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.converters.read().keys().cloned().collect();
        kinds.sort();
        f.debug_struct("Converters")
            .field("converters", &kinds)
            .field("exclude_null_values", &self.exclude_null_values)
            .field("to_hook", &self.to_hook.read().is_some())
            .field("from_hook", &self.from_hook.read().is_some())
            .finish_non_exhaustive()
    }
}

fn converter_key(field_type: &FieldType) -> Option<&str> {
    match field_type {
        FieldType::DateTime => Some("DateTime"),
        FieldType::Enum(_) => Some("Enum"),
        FieldType::Custom(name) => Some(name),
        _ => None,
    }
}

impl Converters {
    /// Converters with the date/time and enum converters installed.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, config: &MapperConfig) -> Self {
        let converters = Self {
            registry,
            exclude_null_values: config.exclude_null_values,
            converters: Arc::new(RwLock::new(HashMap::new())),
            to_hook: Arc::new(RwLock::new(None)),
            from_hook: Arc::new(RwLock::new(None)),
        };
        converters.register("DateTime", Arc::new(DateTimeConverter));
        converters.register(
            "Enum",
            Arc::new(EnumConverter {
                as_int: config.enum_as_int,
            }),
        );
        converters
    }

    /// The registry nested types are resolved against.
    #[must_use]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// Install a converter for `DateTime`, `Enum` or a [`FieldType::Custom`] name.
    pub fn register(&self, kind: impl Into<String>, converter: Arc<dyn ValueConverter>) {
        self.converters.write().insert(kind.into(), converter);
    }

    /// Install or clear the global native to attribute hook.
    pub fn set_to_hook(&self, hook: Option<ToAttributeHook>) {
        *self.to_hook.write() = hook;
    }

    /// Install or clear the global attribute to native hook.
    pub fn set_from_hook(&self, hook: Option<FromAttributeHook>) {
        *self.from_hook.write() = hook;
    }

    fn converter_for(&self, field_type: &FieldType) -> Option<Arc<dyn ValueConverter>> {
        let key = converter_key(field_type)?;
        self.converters.read().get(key).cloned()
    }

    /// Convert a native value.
    pub fn to_attribute_value(
        &self,
        field_type: &FieldType,
        db_type: DbType,
        value: &Value,
    ) -> MapperResult<AttributeValue> {
        let hook = self.to_hook.read().clone();
        if let Some(av) = hook.and_then(|h| h(field_type, db_type, value)) {
            return Ok(av);
        }
        if value.is_null() {
            return Ok(AttributeValue::null());
        }
        if let Some(converter) = self.converter_for(field_type) {
            return converter.to_attribute_value(field_type, db_type, value);
        }
        builtin::to_attribute_value(self, field_type, db_type, value)
    }

    /// Convert an attribute value back to its native form.
    pub fn from_attribute_value(
        &self,
        field_type: &FieldType,
        value: &AttributeValue,
    ) -> MapperResult<Value> {
        let hook = self.from_hook.read().clone();
        if let Some(native) = hook.and_then(|h| h(field_type, value)) {
            return Ok(native);
        }
        if value.is_null() || value.is_empty_set() {
            return Ok(Value::Null);
        }
        if let Some(converter) = self.converter_for(field_type) {
            return converter.from_attribute_value(field_type, value);
        }
        builtin::from_attribute_value(self, field_type, value)
    }

    /// Convert a field value.
    pub fn field_to_attribute_value(
        &self,
        field: &FieldMetadata,
        value: &Value,
    ) -> MapperResult<AttributeValue> {
        self.to_attribute_value(&field.field_type, field.db_type, value)
            .map_err(|e| match e {
                MapperError::Conversion { message, .. } => {
                    MapperError::conversion(&field.name, message)
                }
                other => other,
            })
    }

    /// Convert a record document into an item.
    ///
    /// Members without a declared field are converted by shape. Null
    /// attributes are skipped when the field or the mapper excludes them.
    pub fn to_item(&self, fields: &[FieldMetadata], doc: &Value) -> MapperResult<Item> {
        let Value::Object(members) = doc else {
            return Err(MapperError::conversion("record", "expected a JSON object"));
        };
        let mut item = Item::with_capacity(members.len());
        for (name, value) in members {
            match fields.iter().find(|f| f.native_name == *name) {
                Some(field) => {
                    let av = self.field_to_attribute_value(field, value)?;
                    if av.is_null() && (field.exclude_null_value || self.exclude_null_values) {
                        continue;
                    }
                    item.insert(field.name.clone(), av);
                }
                None => {
                    let av = infer_attribute_value(value);
                    if av.is_null() && self.exclude_null_values {
                        continue;
                    }
                    item.insert(name.clone(), av);
                }
            }
        }
        Ok(item)
    }

    /// Convert an item into a record document. Null attributes are omitted.
    pub fn doc_from_item(
        &self,
        fields: &[FieldMetadata],
        item: &HashMap<String, AttributeValue>,
    ) -> MapperResult<Value> {
        let mut doc = Map::with_capacity(item.len());
        for (name, av) in item {
            let (native_name, native) = match fields.iter().find(|f| f.name == *name) {
                Some(field) => (
                    field.native_name.clone(),
                    self.from_attribute_value(&field.field_type, av)?,
                ),
                None => (name.clone(), infer_native_value(av)),
            };
            if !native.is_null() {
                doc.insert(native_name, native);
            }
        }
        Ok(Value::Object(doc))
    }

    /// Convert an item into a record.
    pub fn from_item<T: DeserializeOwned>(
        &self,
        fields: &[FieldMetadata],
        item: &Item,
    ) -> MapperResult<T> {
        let doc = self.doc_from_item(fields, item)?;
        Ok(serde_json::from_value(doc)?)
    }

    /// Build a primary key from native key values.
    pub fn to_key(
        &self,
        table: &TableMetadata,
        hash: &Value,
        range: Option<&Value>,
    ) -> MapperResult<Key> {
        let mut key = Key::with_capacity(2);
        key.insert(
            table.hash_key.name.clone(),
            self.key_value(&table.hash_key, hash)?,
        );
        match (&table.range_key, range) {
            (Some(field), Some(value)) => {
                key.insert(field.name.clone(), self.key_value(field, value)?);
            }
            (Some(field), None) => {
                return Err(MapperError::conversion(
                    &table.name,
                    format!("range key {} is required", field.name),
                ));
            }
            (None, Some(_)) => {
                return Err(MapperError::conversion(
                    &table.name,
                    "table has no range key",
                ));
            }
            (None, None) => {}
        }
        Ok(key)
    }

    fn key_value(&self, field: &FieldMetadata, value: &Value) -> MapperResult<AttributeValue> {
        let av = self.field_to_attribute_value(field, value)?;
        if av.is_null() {
            return Err(MapperError::conversion(&field.name, "key attributes cannot be empty"));
        }
        Ok(av)
    }

    /// Extract the primary key of an item.
    pub fn key_from_item(&self, table: &TableMetadata, item: &Item) -> MapperResult<Key> {
        let mut key = Key::with_capacity(2);
        for field in std::iter::once(&table.hash_key).chain(table.range_key.as_ref()) {
            let value = item.get(&field.name).ok_or_else(|| {
                MapperError::conversion(&field.name, "key attribute missing from item")
            })?;
            key.insert(field.name.clone(), value.clone());
        }
        Ok(key)
    }

    /// Extract the primary key of a record document.
    pub fn key_from_doc(&self, table: &TableMetadata, doc: &Value) -> MapperResult<Key> {
        let hash = table.hash_key.get(doc).unwrap_or(&Value::Null);
        let range = table
            .range_key
            .as_ref()
            .map(|f| f.get(doc).unwrap_or(&Value::Null));
        self.to_key(table, hash, range)
    }

    /// Non-key fields of a document holding a non-default value.
    pub fn to_non_default_attributes<'t>(
        &self,
        table: &'t TableMetadata,
        doc: &Value,
    ) -> MapperResult<Vec<(&'t FieldMetadata, AttributeValue)>> {
        let mut attributes = Vec::new();
        for field in table.fields.iter().filter(|f| !f.is_key()) {
            let Some(value) = field.get(doc) else {
                continue;
            };
            if is_default_value(value) {
                continue;
            }
            attributes.push((field, self.field_to_attribute_value(field, value)?));
        }
        Ok(attributes)
    }
}
