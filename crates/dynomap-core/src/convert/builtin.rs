//! Built-in conversion, dispatched on the attribute type.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use dynomap_model::AttributeValue;
use serde_json::{Map, Number, Value};

use crate::convert::Converters;
use crate::error::{MapperError, MapperResult};
use crate::metadata::{DbType, FieldType};

pub(crate) fn to_attribute_value(
    converters: &Converters,
    field_type: &FieldType,
    db_type: DbType,
    value: &Value,
) -> MapperResult<AttributeValue> {
    if value.is_null() {
        return Ok(AttributeValue::null());
    }
    if *field_type == FieldType::Json {
        return match db_type {
            DbType::String => Ok(AttributeValue::S(serde_json::to_string(value)?)),
            _ => Ok(infer_attribute_value(value)),
        };
    }
    match db_type {
        DbType::String => Ok(match value {
            Value::String(s) if s.is_empty() => AttributeValue::null(),
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Number(n) => AttributeValue::S(n.to_string()),
            Value::Bool(b) => AttributeValue::S(b.to_string()),
            other => AttributeValue::S(serde_json::to_string(other)?),
        }),
        DbType::Number => Ok(AttributeValue::N(number_text(value)?)),
        DbType::Bool => match value {
            Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
            other => Err(MapperError::conversion(
                "bool",
                format!("expected a boolean, got {other}"),
            )),
        },
        DbType::Binary => Ok(AttributeValue::B(bytes_of(value)?)),
        DbType::StringSet => {
            let items = set_items(value, |v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Ok(other.to_string()),
            })?;
            Ok(if items.is_empty() { AttributeValue::null() } else { AttributeValue::Ss(items) })
        }
        DbType::NumberSet => {
            let items = set_items(value, number_text)?;
            Ok(if items.is_empty() { AttributeValue::null() } else { AttributeValue::Ns(items) })
        }
        DbType::BinarySet => {
            let items = set_items(value, bytes_of)?;
            Ok(if items.is_empty() { AttributeValue::null() } else { AttributeValue::Bs(items) })
        }
        DbType::List => {
            let Value::Array(items) = value else {
                return Err(MapperError::conversion(
                    "list",
                    format!("expected an array, got {value}"),
                ));
            };
            let element = element_of(field_type);
            let converted = items
                .iter()
                .map(|item| match &element {
                    Some(t) => converters.to_attribute_value(t, t.default_db_type(), item),
                    None => Ok(infer_attribute_value(item)),
                })
                .collect::<MapperResult<Vec<_>>>()?;
            Ok(AttributeValue::L(converted))
        }
        DbType::Map => {
            let Value::Object(members) = value else {
                return Err(MapperError::conversion(
                    "map",
                    format!("expected an object, got {value}"),
                ));
            };
            if matches!(field_type, FieldType::Record(_)) {
                if let Some(metadata) = converters.registry().get_or_register_type(field_type)? {
                    return Ok(AttributeValue::M(converters.to_item(&metadata.fields, value)?));
                }
            }
            let element = element_of(field_type);
            let mut converted = HashMap::with_capacity(members.len());
            for (key, item) in members {
                let av = match &element {
                    Some(t) => converters.to_attribute_value(t, t.default_db_type(), item)?,
                    None => infer_attribute_value(item),
                };
                converted.insert(key.clone(), av);
            }
            Ok(AttributeValue::M(converted))
        }
        DbType::Null => Ok(AttributeValue::null()),
    }
}

pub(crate) fn from_attribute_value(
    converters: &Converters,
    field_type: &FieldType,
    value: &AttributeValue,
) -> MapperResult<Value> {
    Ok(match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::S(s) => match field_type {
            FieldType::Json => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
            FieldType::Int | FieldType::UInt | FieldType::Float => {
                parse_number(s, field_type).unwrap_or_else(|| Value::String(s.clone()))
            }
            FieldType::Bool => Value::Bool(s.eq_ignore_ascii_case("true")),
            FieldType::Bytes => match BASE64.decode(s) {
                Ok(raw) => byte_array(&raw),
                Err(_) => Value::String(s.clone()),
            },
            _ => Value::String(s.clone()),
        },
        AttributeValue::N(n) => match field_type {
            FieldType::String => Value::String(n.clone()),
            FieldType::Bool => Value::Bool(n != "0"),
            other => parse_number(n, other).ok_or_else(|| {
                MapperError::conversion("number", format!("{n} is not a valid number"))
            })?,
        },
        AttributeValue::B(b) => match field_type {
            FieldType::String => Value::String(BASE64.encode(b)),
            _ => byte_array(b),
        },
        AttributeValue::Bool(b) => match field_type {
            FieldType::String => Value::String(b.to_string()),
            _ => Value::Bool(*b),
        },
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().map(|s| Value::String(s.clone())).collect())
        }
        AttributeValue::Ns(items) => {
            let element = field_type.element_type();
            Value::Array(
                items
                    .iter()
                    .map(|n| parse_number(n, &element).unwrap_or_else(|| Value::String(n.clone())))
                    .collect(),
            )
        }
        AttributeValue::Bs(items) => Value::Array(items.iter().map(|b| byte_array(b)).collect()),
        AttributeValue::L(items) => {
            let element = element_of(field_type);
            Value::Array(
                items
                    .iter()
                    .map(|item| match &element {
                        Some(t) => converters.from_attribute_value(t, item),
                        None => Ok(infer_native_value(item)),
                    })
                    .collect::<MapperResult<Vec<_>>>()?,
            )
        }
        AttributeValue::M(members) => {
            if matches!(field_type, FieldType::Record(_)) {
                if let Some(metadata) = converters.registry().get_or_register_type(field_type)? {
                    return converters.doc_from_item(&metadata.fields, members);
                }
            }
            let element = element_of(field_type);
            let mut map = Map::with_capacity(members.len());
            for (key, item) in members {
                let native = match &element {
                    Some(t) => converters.from_attribute_value(t, item)?,
                    None => infer_native_value(item),
                };
                map.insert(key.clone(), native);
            }
            Value::Object(map)
        }
    })
}

/// Attribute value of an undeclared member, chosen from the JSON shape.
#[must_use]
pub fn infer_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::null(),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) if s.is_empty() => AttributeValue::null(),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(infer_attribute_value).collect()),
        Value::Object(members) => AttributeValue::M(
            members
                .iter()
                .map(|(k, v)| (k.clone(), infer_attribute_value(v)))
                .collect(),
        ),
    }
}

/// Native value of an undeclared attribute.
#[must_use]
pub fn infer_native_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => {
            parse_number(n, &FieldType::Json).unwrap_or_else(|| Value::String(n.clone()))
        }
        AttributeValue::B(b) => byte_array(b),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| {
                    parse_number(n, &FieldType::Json).unwrap_or_else(|| Value::String(n.clone()))
                })
                .collect(),
        ),
        AttributeValue::Bs(items) => Value::Array(items.iter().map(|b| byte_array(b)).collect()),
        AttributeValue::L(items) => Value::Array(items.iter().map(infer_native_value).collect()),
        AttributeValue::M(members) => Value::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), infer_native_value(v)))
                .collect(),
        ),
    }
}

/// Element type of a list or map, `None` when elements must be inferred.
fn element_of(field_type: &FieldType) -> Option<FieldType> {
    match field_type {
        FieldType::List(inner) | FieldType::Map(inner) => Some((**inner).clone()),
        _ => None,
    }
}

fn number_text(value: &Value) -> MapperResult<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(s.trim().to_owned()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_owned()),
        other => Err(MapperError::conversion("number", format!("expected a number, got {other}"))),
    }
}

/// Parse number text into the JSON number closest to `target`.
fn parse_number(text: &str, target: &FieldType) -> Option<Value> {
    let text = text.trim();
    let number = match target {
        FieldType::Float => text.parse::<f64>().ok().and_then(Number::from_f64),
        FieldType::UInt => text
            .parse::<u64>()
            .ok()
            .map(Number::from)
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64)),
        _ => text
            .parse::<i64>()
            .ok()
            .map(Number::from)
            .or_else(|| text.parse::<u64>().ok().map(Number::from))
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64)),
    };
    number.map(Value::Number)
}

fn bytes_of(value: &Value) -> MapperResult<Bytes> {
    match value {
        Value::String(s) => BASE64
            .decode(s)
            .map(Bytes::from)
            .map_err(|e| MapperError::conversion("binary", e.to_string())),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| MapperError::conversion("binary", format!("{v} is not a byte")))
            })
            .collect::<MapperResult<Vec<u8>>>()
            .map(Bytes::from),
        other => Err(MapperError::conversion("binary", format!("expected bytes, got {other}"))),
    }
}

fn byte_array(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn set_items<T: PartialEq>(
    value: &Value,
    convert: impl Fn(&Value) -> MapperResult<T>,
) -> MapperResult<Vec<T>> {
    let Value::Array(items) = value else {
        return Err(MapperError::conversion("set", format!("expected an array, got {value}")));
    };
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let converted = convert(item)?;
        if !out.contains(&converted) {
            out.push(converted);
        }
    }
    Ok(out)
}
