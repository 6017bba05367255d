//! Key values and key resolution.

use std::collections::HashMap;

use dynamap_model::{AttributeValue, Key};
use serde_json::{Map, Value};

use crate::error::MapperError;
use crate::metadata::ModelMetadata;

/// Key values addressing one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keys {
    /// A partition key value; the sort key, if any, falls back to the model's
    /// default.
    Partition(AttributeValue),
    /// A partition and sort key value pair.
    Composite(AttributeValue, AttributeValue),
}

impl Keys {
    /// Build a partition-only key.
    pub fn partition(pk: impl Into<AttributeValue>) -> Self {
        Self::Partition(pk.into())
    }

    /// Build a partition + sort key.
    pub fn composite(pk: impl Into<AttributeValue>, sk: impl Into<AttributeValue>) -> Self {
        Self::Composite(pk.into(), sk.into())
    }

    /// The partition key value.
    #[must_use]
    pub fn pk(&self) -> &AttributeValue {
        match self {
            Self::Partition(pk) | Self::Composite(pk, _) => pk,
        }
    }

    /// The sort key value, when given.
    #[must_use]
    pub fn sk(&self) -> Option<&AttributeValue> {
        match self {
            Self::Partition(_) => None,
            Self::Composite(_, sk) => Some(sk),
        }
    }
}

impl From<&str> for Keys {
    fn from(pk: &str) -> Self {
        Self::partition(pk)
    }
}

impl From<String> for Keys {
    fn from(pk: String) -> Self {
        Self::partition(pk)
    }
}

impl From<AttributeValue> for Keys {
    fn from(pk: AttributeValue) -> Self {
        Self::Partition(pk)
    }
}

impl<P, S> From<(P, S)> for Keys
where
    P: Into<AttributeValue>,
    S: Into<AttributeValue>,
{
    fn from((pk, sk): (P, S)) -> Self {
        Self::composite(pk, sk)
    }
}

/// Build the transport key of `keys` under `meta`.
///
/// The sort key is only emitted when the table declares one; a declared sort
/// key without a value or default is a key error.
pub(crate) fn key_for(meta: &ModelMetadata, keys: &Keys) -> Result<Key, MapperError> {
    build_key(meta, Some(keys.pk().clone()), keys.sk().cloned())
}

/// Resolve the key of a record being written.
///
/// Explicit keys win over values found in the record; a missing sort key falls
/// back to the model's default.
pub(crate) fn key_for_write(
    meta: &ModelMetadata,
    record: &Map<String, Value>,
    explicit: Option<&Keys>,
) -> Result<Key, MapperError> {
    let from_record = |name: &str| {
        record
            .get(name)
            .filter(|v| !v.is_null())
            .map(|v| AttributeValue::from(v.clone()))
    };

    let pk = explicit
        .map(|k| k.pk().clone())
        .or_else(|| from_record(&meta.keys.partition));
    let sk = explicit
        .and_then(|k| k.sk().cloned())
        .or_else(|| meta.keys.sort.as_deref().and_then(from_record));
    build_key(meta, pk, sk)
}

fn build_key(
    meta: &ModelMetadata,
    pk: Option<AttributeValue>,
    sk: Option<AttributeValue>,
) -> Result<Key, MapperError> {
    let pk = pk.filter(|v| !v.is_blank()).ok_or_else(|| {
        MapperError::key(format!(
            "partition key '{}' of {} is missing",
            meta.keys.partition, meta.model
        ))
    })?;

    let mut key = HashMap::with_capacity(2);
    key.insert(meta.keys.partition.clone(), pk);

    if let Some(sort) = &meta.keys.sort {
        let sk = sk
            .filter(|v| !v.is_blank())
            .or_else(|| meta.default_sort_key.clone().map(AttributeValue::S))
            .ok_or_else(|| {
                MapperError::key(format!(
                    "sort key '{sort}' of {} is missing and has no default",
                    meta.model
                ))
            })?;
        key.insert(sort.clone(), sk);
    }
    Ok(key)
}
