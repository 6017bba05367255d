//! Schema descriptions and positional field shapes.
//!
//! A [`SchemaNode`] describes the structure of a record. [`extract_shape`]
//! reduces it to a [`RecordShape`]: the ordered list of fields the compact
//! codec walks positionally. Field order is load-bearing; reordering fields in
//! a schema changes the meaning of every value already stored under it.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Schema description
// ---------------------------------------------------------------------------

/// A structural description of a record, in the vocabulary of common
/// validation libraries.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Any string.
    String,
    /// Any number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Only `null`.
    Null,
    /// Anything.
    Any,
    /// Exactly this value.
    Literal(Value),
    /// One of these strings.
    Enum(Vec<String>),
    /// An object with fields in declaration order.
    Object(Vec<(String, SchemaNode)>),
    /// A list of items.
    Array(Box<SchemaNode>),
    /// A map from string keys to values.
    Record(Box<SchemaNode>),
    /// The first matching branch.
    Union(Vec<SchemaNode>),
    /// May be absent.
    Optional(Box<SchemaNode>),
    /// May be `null`.
    Nullable(Box<SchemaNode>),
    /// Absent values take a default.
    Default(Box<SchemaNode>, Value),
    /// Refinements and transforms over an inner schema.
    Effects(Box<SchemaNode>),
}

impl SchemaNode {
    /// An object schema from `(name, schema)` pairs.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A list schema of `item`.
    #[must_use]
    pub fn array(item: SchemaNode) -> Self {
        Self::Array(Box::new(item))
    }

    /// A string-keyed map schema of `value`.
    #[must_use]
    pub fn record(value: SchemaNode) -> Self {
        Self::Record(Box::new(value))
    }

    /// Wrap this schema as optional.
    #[must_use]
    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    /// Wrap this schema as nullable.
    #[must_use]
    pub fn nullable(self) -> Self {
        Self::Nullable(Box::new(self))
    }

    /// Wrap this schema with a default value.
    #[must_use]
    pub fn with_default(self, value: Value) -> Self {
        Self::Default(Box::new(self), value)
    }

    /// Merge the fields of two object schemas; later fields replace earlier
    /// ones with the same name in place. Non-object schemas are returned
    /// unchanged.
    #[must_use]
    pub fn merge(self, other: SchemaNode) -> Self {
        match (self, other) {
            (Self::Object(mut fields), Self::Object(extra)) => {
                for (name, node) in extra {
                    match fields.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = node,
                        None => fields.push((name, node)),
                    }
                }
                Self::Object(fields)
            }
            (this, _) => this,
        }
    }

    /// A deterministic hex digest of this schema.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(format!("{self:?}").as_bytes()))
    }

    /// Strip wrappers that do not change structure; a union resolves to its
    /// first non-null branch.
    fn structural(&self) -> &SchemaNode {
        match self {
            Self::Optional(inner)
            | Self::Nullable(inner)
            | Self::Default(inner, _)
            | Self::Effects(inner) => inner.structural(),
            Self::Union(branches) => branches
                .iter()
                .find(|b| !matches!(b.structural(), Self::Null))
                .or_else(|| branches.first())
                .map_or(self, SchemaNode::structural),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Field shapes
// ---------------------------------------------------------------------------

/// One positional slot of a record shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldShape {
    /// A leaf value: a scalar, or a list/map stored whole.
    Field(String),
    /// A nested object.
    Group(String, Vec<FieldShape>),
    /// A list of nested objects.
    ArrayGroup(String, Vec<FieldShape>),
}

impl FieldShape {
    /// A nested object slot.
    pub fn group<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldShape>,
    {
        Self::Group(name.into(), fields.into_iter().map(Into::into).collect())
    }

    /// A list-of-objects slot.
    pub fn array_group<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldShape>,
    {
        Self::ArrayGroup(name.into(), fields.into_iter().map(Into::into).collect())
    }

    /// The record field this slot reads from.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(name) | Self::Group(name, _) | Self::ArrayGroup(name, _) => name,
        }
    }
}

impl From<&str> for FieldShape {
    fn from(name: &str) -> Self {
        Self::Field(name.to_owned())
    }
}

impl From<String> for FieldShape {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "'{name}'"),
            Self::Group(name, fields) => {
                write!(f, "{{{name}:")?;
                write_fields(f, fields)?;
                f.write_str("}")
            }
            Self::ArrayGroup(name, fields) => {
                write!(f, "{{{name}:[")?;
                write_fields(f, fields)?;
                f.write_str("]}")
            }
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[FieldShape]) -> fmt::Result {
    f.write_str("[")?;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{field}")?;
    }
    f.write_str("]")
}

/// The top-level positional shape of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordShape {
    fields: Vec<FieldShape>,
    repeated: bool,
}

impl RecordShape {
    /// A shape for a single record.
    #[must_use]
    pub fn new(fields: Vec<FieldShape>) -> Self {
        Self {
            fields,
            repeated: false,
        }
    }

    /// A shape for a list of records, each with `fields`.
    #[must_use]
    pub fn repeated(fields: Vec<FieldShape>) -> Self {
        Self {
            fields,
            repeated: true,
        }
    }

    /// The ordered slots.
    #[must_use]
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    /// Whether one stored value holds a list of records.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Whether the shape has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether a top-level slot reads from `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    /// A deterministic hex digest of the shape, including the repeated tag.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(if self.repeated { b"*" } else { b"=" });
        hasher.update(self.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl<F: Into<FieldShape>> FromIterator<F> for RecordShape {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.fields)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Derive the positional shape of `schema`.
///
/// An object yields its fields in declaration order; a list of objects yields
/// the item's fields tagged as repeated; anything else yields an empty shape.
#[must_use]
pub fn extract_shape(schema: &SchemaNode) -> RecordShape {
    match schema.structural() {
        SchemaNode::Object(fields) => RecordShape::new(extract_fields(fields)),
        SchemaNode::Array(item) => match item.structural() {
            SchemaNode::Object(fields) => RecordShape::repeated(extract_fields(fields)),
            _ => RecordShape::default(),
        },
        _ => RecordShape::default(),
    }
}

fn extract_fields(fields: &[(String, SchemaNode)]) -> Vec<FieldShape> {
    fields
        .iter()
        .map(|(name, node)| match node.structural() {
            SchemaNode::Object(inner) => FieldShape::Group(name.clone(), extract_fields(inner)),
            SchemaNode::Array(item) => match item.structural() {
                SchemaNode::Object(inner) => {
                    FieldShape::ArrayGroup(name.clone(), extract_fields(inner))
                }
                _ => FieldShape::Field(name.clone()),
            },
            _ => FieldShape::Field(name.clone()),
        })
        .collect()
}

/// Memoized shape extraction keyed by schema fingerprint.
#[derive(Debug, Default)]
pub struct ShapeCache {
    entries: DashMap<String, Arc<RecordShape>>,
}

impl ShapeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shape of `schema`, extracting it on first use.
    #[must_use]
    pub fn get_or_extract(&self, schema: &SchemaNode) -> Arc<RecordShape> {
        self.entries
            .entry(schema.fingerprint())
            .or_insert_with(|| {
                tracing::trace!("extracting record shape");
                Arc::new(extract_shape(schema))
            })
            .clone()
    }

    /// Drop the cached shape of `schema`. Returns whether one was cached.
    pub fn invalidate(&self, schema: &SchemaNode) -> bool {
        self.entries.remove(&schema.fingerprint()).is_some()
    }

    /// Drop every cached shape.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
