//! Positional zipping of records against a field shape.
//!
//! Zipping turns a record into nested lists ordered by the shape, replacing
//! repeated scalars with back-references. Unzipping walks the same shape in
//! the same depth-first order, so both sides register memoized values at the
//! same indices.

use serde_json::{Map, Value};

use super::text::Packed;
use crate::error::CodecError;
use crate::schema::FieldShape;

/// Scalars seen so far, in first-occurrence order.
#[derive(Debug, Default)]
pub(crate) struct Memo {
    seen: Vec<Value>,
}

impl Memo {
    /// Pack a leaf value, replacing a repeated scalar with a back-reference.
    fn pack(&mut self, value: &Value) -> Packed {
        if is_memoizable(value) {
            if let Some(index) = self.seen.iter().position(|seen| seen == value) {
                return Packed::Ref(index);
            }
            self.seen.push(value.clone());
        }
        Packed::from_value(value)
    }

    /// Unpack a leaf slot, resolving back-references.
    fn unpack(&mut self, packed: Packed) -> Result<Value, CodecError> {
        if let Packed::Ref(index) = packed {
            return self
                .seen
                .get(index)
                .cloned()
                .ok_or(CodecError::UnresolvedReference {
                    index,
                    seen: self.seen.len(),
                });
        }
        let value = packed.into_value()?;
        if is_memoizable(&value) {
            self.seen.push(value.clone());
        }
        Ok(value)
    }
}

/// Whether a leaf value takes part in back-referencing.
///
/// Values that already pack to one or two characters, and values stored whole
/// (lists and maps), are written as-is.
fn is_memoizable(value: &Value) -> bool {
    match value {
        Value::String(s) => s.chars().count() >= 2 && s != "true" && s != "false",
        Value::Number(n) => n.to_string().len() >= 2,
        _ => false,
    }
}

fn kind(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
    .to_owned()
}

// ---------------------------------------------------------------------------
// Zip
// ---------------------------------------------------------------------------

/// Zip one record into a list of slots.
pub(crate) fn zip_record(
    value: &Value,
    fields: &[FieldShape],
    memo: &mut Memo,
    path: &str,
) -> Result<Packed, CodecError> {
    let Value::Object(record) = value else {
        return Err(CodecError::ShapeMismatch {
            field: path.to_owned(),
            expected: "object",
            found: kind(value),
        });
    };

    fields
        .iter()
        .map(|field| zip_field(record.get(field.name()).unwrap_or(&Value::Null), field, memo))
        .collect::<Result<Vec<_>, _>>()
        .map(Packed::List)
}

fn zip_field(value: &Value, field: &FieldShape, memo: &mut Memo) -> Result<Packed, CodecError> {
    match field {
        FieldShape::Field(_) => Ok(memo.pack(value)),
        FieldShape::Group(name, children) => match value {
            Value::Null => Ok(Packed::Null),
            Value::Object(_) => zip_record(value, children, memo, name),
            other => Err(CodecError::ShapeMismatch {
                field: name.clone(),
                expected: "object",
                found: kind(other),
            }),
        },
        FieldShape::ArrayGroup(name, children) => match value {
            Value::Null => Ok(Packed::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| zip_record(item, children, memo, name))
                .collect::<Result<Vec<_>, _>>()
                .map(Packed::List),
            other => Err(CodecError::ShapeMismatch {
                field: name.clone(),
                expected: "list of objects",
                found: kind(other),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Unzip
// ---------------------------------------------------------------------------

/// Rebuild one record from its list of slots.
///
/// Missing trailing slots read as `null`; extra slots are ignored.
pub(crate) fn unzip_record(
    packed: Packed,
    fields: &[FieldShape],
    memo: &mut Memo,
    path: &str,
) -> Result<Value, CodecError> {
    let Packed::List(slots) = packed else {
        return Err(CodecError::ShapeMismatch {
            field: path.to_owned(),
            expected: "list of slots",
            found: packed.kind().to_owned(),
        });
    };

    let mut slots = slots.into_iter();
    let mut record = Map::with_capacity(fields.len());
    for field in fields {
        let slot = slots.next().unwrap_or(Packed::Null);
        record.insert(field.name().to_owned(), unzip_field(slot, field, memo)?);
    }
    Ok(Value::Object(record))
}

fn unzip_field(slot: Packed, field: &FieldShape, memo: &mut Memo) -> Result<Value, CodecError> {
    match field {
        FieldShape::Field(_) => memo.unpack(slot),
        FieldShape::Group(name, children) => match slot {
            Packed::Null => Ok(Value::Null),
            slot => unzip_record(slot, children, memo, name),
        },
        FieldShape::ArrayGroup(name, children) => match slot {
            Packed::Null => Ok(Value::Null),
            Packed::List(items) => items
                .into_iter()
                .map(|item| unzip_record(item, children, memo, name))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(CodecError::ShapeMismatch {
                field: name.clone(),
                expected: "list of records",
                found: other.kind().to_owned(),
            }),
        },
    }
}
