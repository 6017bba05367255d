//! `AttributeValue`, the store's typed value union.
//!
//! On the wire every value is a single-key object such as `{"S": "hello"}`.
//! Records handled by the mapper are plain JSON documents, so this module
//! also converts between `AttributeValue` and [`serde_json::Value`].

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A store attribute value.
///
/// Numbers are kept as strings so no precision is lost in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, string-encoded.
    N(String),
    /// Binary, base64 in JSON.
    #[serde(with = "base64_bytes")]
    B(Bytes),
    /// String set.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Number set.
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Binary set.
    #[serde(rename = "BS", with = "base64_list")]
    Bs(Vec<Bytes>),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null; the flag is always `true` on the wire.
    #[serde(rename = "NULL")]
    Null(bool),
    /// List.
    L(Vec<AttributeValue>),
    /// Map.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The string of an `S` value.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// The entries of an `M` value.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// The elements of an `L` value.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// Whether this value cannot address an item: null, `""` or empty binary.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::S(s) => s.is_empty(),
            Self::B(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Convert into a JSON document value.
    ///
    /// Binary values become base64 strings and sets become arrays. A number
    /// that fits neither `i64`, `u64` nor a finite `f64` stays a string.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::S(s) => Value::String(s),
            Self::N(n) => number_to_json(n),
            Self::B(b) => Value::String(STANDARD.encode(&b)),
            Self::Ss(v) => Value::Array(v.into_iter().map(Value::String).collect()),
            Self::Ns(v) => Value::Array(v.into_iter().map(number_to_json).collect()),
            Self::Bs(v) => Value::Array(
                v.iter()
                    .map(|b| Value::String(STANDARD.encode(b)))
                    .collect(),
            ),
            Self::Bool(b) => Value::Bool(b),
            Self::Null(_) => Value::Null,
            Self::L(list) => Value::Array(list.into_iter().map(Self::into_json).collect()),
            Self::M(m) => Value::Object(
                m.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

fn number_to_json(n: String) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = n.parse::<u64>() {
        return Value::Number(u.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::String(n), Value::Number)
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(b: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(b))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(de::Error::custom)
    }
}

mod base64_list {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(v: &[Bytes], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(|b| STANDARD.encode(b)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Bytes>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|e| {
                STANDARD
                    .decode(e)
                    .map(Bytes::from)
                    .map_err(de::Error::custom)
            })
            .collect()
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null(true),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::N(n.to_string()),
            Value::String(s) => Self::S(s),
            Value::Array(list) => Self::L(list.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::M(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        value.into_json()
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::N(n.to_string())
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        Self::N(n.to_string())
    }
}

impl From<u64> for AttributeValue {
    fn from(n: u64) -> Self {
        Self::N(n.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(list: Vec<AttributeValue>) -> Self {
        Self::L(list)
    }
}

// Values are used as placeholder-table keys by the query builder.
impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            Self::Ss(v) | Self::Ns(v) => v.hash(state),
            Self::Bs(v) => v.hash(state),
            Self::L(v) => v.hash(state),
            Self::M(m) => {
                let mut pairs: Vec<_> = m.iter().collect();
                pairs.sort_by_key(|(k, _)| *k);
                pairs.hash(state);
            }
        }
    }
}
