//! The DynamoDB `AttributeValue` tagged union.
//!
//! On the wire every value is a single-key JSON object such as `{"N": "42"}`.
//! Binary payloads travel base64 encoded; numbers travel as strings so that no
//! precision is lost between the client and the store.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type descriptors accepted as the single key of an attribute value object.
const TYPE_DESCRIPTORS: &[&str] = &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"];

/// A single DynamoDB attribute value.
///
/// Exactly one variant is populated. Empty sets are not representable by the
/// store, callers are expected to send [`AttributeValue::null`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, kept in its decimal string form.
    N(String),
    /// Binary.
    B(Bytes),
    /// String set.
    Ss(Vec<String>),
    /// Number set.
    Ns(Vec<String>),
    /// Binary set.
    Bs(Vec<Bytes>),
    /// Boolean.
    Bool(bool),
    /// Null marker. The store only ever sends `true`.
    Null(bool),
    /// Ordered list of values.
    L(Vec<AttributeValue>),
    /// Nested document.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The canonical null attribute value.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(true)
    }

    /// Build a string value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Build a number value from anything with a decimal `Display`.
    #[must_use]
    pub fn number(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    /// Returns `true` for the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }

    /// Returns `true` for a set variant with no members.
    ///
    /// Such a value would be rejected by the store.
    #[must_use]
    pub fn is_empty_set(&self) -> bool {
        match self {
            Self::Ss(v) | Self::Ns(v) => v.is_empty(),
            Self::Bs(v) => v.is_empty(),
            _ => false,
        }
    }

    /// Returns the string if this is an `S` value.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the decimal string if this is an `N` value.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the flag if this is a `BOOL` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the entries if this is an `M` value.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// The wire type descriptor, e.g. `"S"` or `"BOOL"`.
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

impl Eq for AttributeValue {}

impl std::hash::Hash for AttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_descriptor().hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            Self::Ss(v) | Self::Ns(v) => v.hash(state),
            Self::Bs(v) => v.hash(state),
            Self::L(v) => v.hash(state),
            Self::M(m) => {
                // HashMap iteration order is unspecified.
                let mut entries: Vec<_> = m.iter().collect();
                entries.sort_by_key(|(k, _)| *k);
                entries.hash(state);
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S({s})"),
            Self::N(n) => write!(f, "N({n})"),
            Self::B(b) => write!(f, "B({} bytes)", b.len()),
            Self::Ss(v) => write!(f, "SS({})", v.join(", ")),
            Self::Ns(v) => write!(f, "NS({})", v.join(", ")),
            Self::Bs(v) => write!(f, "BS({} items)", v.len()),
            Self::Bool(b) => write!(f, "BOOL({b})"),
            Self::Null(_) => f.write_str("NULL"),
            Self::L(v) => write!(f, "L({} items)", v.len()),
            Self::M(m) => write!(f, "M({} keys)", m.len()),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::N(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let key = self.type_descriptor();
        match self {
            Self::S(s) | Self::N(s) => map.serialize_entry(key, s)?,
            Self::B(b) => map.serialize_entry(key, &BASE64.encode(b))?,
            Self::Ss(v) | Self::Ns(v) => map.serialize_entry(key, v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| BASE64.encode(b)).collect();
                map.serialize_entry(key, &encoded)?;
            }
            Self::Bool(b) | Self::Null(b) => map.serialize_entry(key, b)?,
            Self::L(list) => map.serialize_entry(key, list)?,
            Self::M(m) => map.serialize_entry(key, m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

fn decode_binary<E: de::Error>(encoded: &str) -> Result<Bytes, E> {
    BASE64
        .decode(encoded)
        .map(Bytes::from)
        .map_err(de::Error::custom)
}

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object with a single DynamoDB type descriptor key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom("empty AttributeValue object"));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => AttributeValue::B(decode_binary::<M::Error>(&map.next_value::<String>()?)?),
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                AttributeValue::Bs(
                    encoded
                        .iter()
                        .map(|e| decode_binary::<M::Error>(e))
                        .collect::<Result<_, _>>()?,
                )
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => return Err(de::Error::unknown_field(other, TYPE_DESCRIPTORS)),
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_number_as_string() {
        let json = serde_json::to_string(&AttributeValue::number(42)).unwrap();
        assert_eq!(json, r#"{"N":"42"}"#);
    }

    #[test]
    fn test_should_serialize_binary_as_base64() {
        let val = AttributeValue::B(Bytes::from_static(b"hi"));
        let json = serde_json::to_string(&val).unwrap();
        assert_eq!(json, r#"{"B":"aGk="}"#);
    }

    #[test]
    fn test_should_deserialize_nested_document() {
        let json =
            r#"{"M":{"tags":{"SS":["a","b"]},"items":{"L":[{"NULL":true},{"BOOL":false}]}}}"#;
        let val: AttributeValue = serde_json::from_str(json).unwrap();
        let m = val.as_m().unwrap();
        assert_eq!(m["tags"], AttributeValue::Ss(vec!["a".into(), "b".into()]));
        let AttributeValue::L(items) = &m["items"] else {
            panic!("expected a list");
        };
        assert!(items[0].is_null());
        assert_eq!(items[1].as_bool(), Some(false));
    }

    #[test]
    fn test_should_reject_unknown_descriptor() {
        let result: Result<AttributeValue, _> = serde_json::from_str(r#"{"X":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_detect_empty_sets() {
        assert!(AttributeValue::Ss(vec![]).is_empty_set());
        assert!(AttributeValue::Bs(vec![]).is_empty_set());
        assert!(!AttributeValue::Ns(vec!["1".into()]).is_empty_set());
        assert!(!AttributeValue::S(String::new()).is_empty_set());
    }

    #[test]
    fn test_should_hash_maps_independent_of_insertion_order() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut a = HashMap::new();
        a.insert("x".to_owned(), AttributeValue::from(1_i64));
        a.insert("y".to_owned(), AttributeValue::from("b"));
        let mut b = HashMap::new();
        b.insert("y".to_owned(), AttributeValue::from("b"));
        b.insert("x".to_owned(), AttributeValue::from(1_i64));

        let hash = |v: &AttributeValue| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&AttributeValue::M(a)), hash(&AttributeValue::M(b)));
    }
}
