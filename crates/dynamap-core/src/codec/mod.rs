//! Compact record codec.
//!
//! A record is zipped against its [`RecordShape`] into positional lists,
//! repeated scalars become `^N` back-references, and the result is written in
//! a short single-quoted text form with type tags. The stored
//! value lives under the [`COMPACT_ATTRIBUTE`] attribute of an item.
//!
//! ```
//! use dynamap_core::codec;
//! use dynamap_core::schema::RecordShape;
//! use serde_json::json;
//!
//! let shape: RecordShape = ["id", "name"].into_iter().collect();
//! let packed = codec::encode(&json!({"id": "abc", "name": "abc"}), &shape).unwrap();
//! assert_eq!(packed, "['abc',^0]");
//! assert_eq!(
//!     codec::decode(&packed, &shape).unwrap(),
//!     json!({"id": "abc", "name": "abc"})
//! );
//! ```

mod text;
mod zip;

use dynamap_model::{AttributeValue, Item};
use serde_json::{Map, Value};

use self::text::Packed;
use self::zip::{Memo, unzip_record, zip_record};
use crate::error::CodecError;
use crate::schema::RecordShape;

/// Attribute holding the compact value of an item.
pub const COMPACT_ATTRIBUTE: &str = "V";

const ROOT: &str = "$";

/// Encode `value` against `shape`.
///
/// A list value is encoded element-wise, sharing one back-reference table.
pub fn encode(value: &Value, shape: &RecordShape) -> Result<String, CodecError> {
    let mut memo = Memo::default();
    let packed = match value {
        Value::Array(records) => Packed::List(
            records
                .iter()
                .map(|record| zip_record(record, shape.fields(), &mut memo, ROOT))
                .collect::<Result<_, _>>()?,
        ),
        record => zip_record(record, shape.fields(), &mut memo, ROOT)?,
    };
    Ok(text::write(&packed))
}

/// Decode `text` against `shape`.
///
/// A repeated shape decodes to a list of records. Decoding is positional: a
/// shape that changed since the value was written is not detected.
pub fn decode(text: &str, shape: &RecordShape) -> Result<Value, CodecError> {
    let packed = text::parse(text)?;
    let mut memo = Memo::default();
    if !shape.is_repeated() {
        return unzip_record(packed, shape.fields(), &mut memo, ROOT);
    }

    match packed {
        Packed::List(records) => records
            .into_iter()
            .map(|record| unzip_record(record, shape.fields(), &mut memo, ROOT))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(CodecError::ShapeMismatch {
            field: ROOT.to_owned(),
            expected: "list of records",
            found: other.kind().to_owned(),
        }),
    }
}

/// Decode a stored item.
///
/// An item carrying a string [`COMPACT_ATTRIBUTE`] decodes to its record;
/// any other item is returned as a plain JSON object of its attributes.
pub fn decode_item(item: &Item, shape: &RecordShape) -> Result<Value, CodecError> {
    if let Some(AttributeValue::S(packed)) = item.get(COMPACT_ATTRIBUTE) {
        return decode(packed, shape);
    }
    Ok(Value::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), v.clone().into_json()))
            .collect::<Map<_, _>>(),
    ))
}

/// Decode every item of a result page, in order.
pub fn decode_items(items: &[Item], shape: &RecordShape) -> Result<Vec<Value>, CodecError> {
    items.iter().map(|item| decode_item(item, shape)).collect()
}
