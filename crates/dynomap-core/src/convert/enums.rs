//! Unit enums stored by name or by ordinal.

use dynomap_model::AttributeValue;
use serde_json::Value;

use crate::convert::ValueConverter;
use crate::error::{MapperError, MapperResult};
use crate::metadata::{DbType, FieldType};

/// Converts [`FieldType::Enum`] fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumConverter {
    /// Store the variant ordinal instead of its name.
    pub as_int: bool,
}

fn variants(field_type: &FieldType) -> MapperResult<&'static [&'static str]> {
    match field_type {
        FieldType::Enum(variants) => Ok(*variants),
        other => Err(MapperError::conversion(
            "enum",
            format!("{other:?} is not an enum"),
        )),
    }
}

fn ordinal(variants: &[&str], value: &Value) -> MapperResult<usize> {
    let found = match value {
        Value::String(name) => variants.iter().position(|v| v == name),
        Value::Number(n) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < variants.len()),
        _ => None,
    };
    found.ok_or_else(|| {
        MapperError::conversion(
            "enum",
            format!("{value} is not one of {}", variants.join(", ")),
        )
    })
}

impl ValueConverter for EnumConverter {
    fn to_attribute_value(
        &self,
        field_type: &FieldType,
        db_type: DbType,
        value: &Value,
    ) -> MapperResult<AttributeValue> {
        let variants = variants(field_type)?;
        let index = ordinal(variants, value)?;
        Ok(if self.as_int || db_type == DbType::Number {
            AttributeValue::number(index)
        } else {
            AttributeValue::S(variants[index].to_owned())
        })
    }

    fn from_attribute_value(
        &self,
        field_type: &FieldType,
        value: &AttributeValue,
    ) -> MapperResult<Value> {
        let variants = variants(field_type)?;
        let native = match value {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => Value::from(n.parse::<u64>().map_err(|e| {
                MapperError::conversion("enum", format!("{n}: {e}"))
            })?),
            other => {
                return Err(MapperError::conversion(
                    "enum",
                    format!("cannot read an enum from {}", other.type_descriptor()),
                ));
            }
        };
        let index = ordinal(variants, &native)?;
        Ok(Value::String(variants[index].to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const STATUS: FieldType = FieldType::Enum(&["Pending", "Shipped", "Delivered"]);

    #[test]
    fn test_should_store_enum_by_name() {
        let converter = EnumConverter::default();
        let av = converter
            .to_attribute_value(&STATUS, DbType::String, &json!("Shipped"))
            .unwrap();
        assert_eq!(av, AttributeValue::S("Shipped".to_owned()));
        assert_eq!(converter.from_attribute_value(&STATUS, &av).unwrap(), json!("Shipped"));
    }

    #[test]
    fn test_should_store_enum_by_ordinal() {
        let converter = EnumConverter { as_int: true };
        let av = converter
            .to_attribute_value(&STATUS, DbType::String, &json!("Delivered"))
            .unwrap();
        assert_eq!(av, AttributeValue::N("2".to_owned()));
        assert_eq!(converter.from_attribute_value(&STATUS, &av).unwrap(), json!("Delivered"));
    }

    #[test]
    fn test_should_reject_unknown_variant() {
        let converter = EnumConverter::default();
        assert!(converter
            .to_attribute_value(&STATUS, DbType::String, &json!("Lost"))
            .is_err());
        assert!(converter
            .from_attribute_value(&STATUS, &AttributeValue::N("9".to_owned()))
            .is_err());
    }
}
