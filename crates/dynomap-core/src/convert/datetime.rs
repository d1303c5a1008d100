//! Timestamps as RFC 3339 strings (or epoch milliseconds when stored as numbers).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use dynomap_model::AttributeValue;
use serde_json::Value;

use crate::convert::ValueConverter;
use crate::error::{MapperError, MapperResult};
use crate::metadata::{DbType, FieldType};

/// Converts [`FieldType::DateTime`] fields.
///
/// Values are normalised to UTC. Strings without an offset are read as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

fn parse(text: &str) -> MapperResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| MapperError::conversion("datetime", format!("{text}: {e}")))
}

fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl ValueConverter for DateTimeConverter {
    fn to_attribute_value(
        &self,
        _field_type: &FieldType,
        db_type: DbType,
        value: &Value,
    ) -> MapperResult<AttributeValue> {
        let dt = match value {
            Value::String(s) => parse(s)?,
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| {
                    MapperError::conversion("datetime", format!("{n} is out of range"))
                })?,
            other => {
                return Err(MapperError::conversion(
                    "datetime",
                    format!("expected a timestamp, got {other}"),
                ));
            }
        };
        Ok(match db_type {
            DbType::Number => AttributeValue::number(dt.timestamp_millis()),
            _ => AttributeValue::S(format(&dt)),
        })
    }

    fn from_attribute_value(
        &self,
        _field_type: &FieldType,
        value: &AttributeValue,
    ) -> MapperResult<Value> {
        let dt = match value {
            AttributeValue::S(s) => parse(s)?,
            AttributeValue::N(n) => n
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| {
                    MapperError::conversion("datetime", format!("{n} is not epoch millis"))
                })?,
            other => {
                return Err(MapperError::conversion(
                    "datetime",
                    format!("cannot read a timestamp from {}", other.type_descriptor()),
                ));
            }
        };
        Ok(Value::String(format(&dt)))
    }
}
