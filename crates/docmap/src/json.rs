//! JSON text rendering of document values.
//!
//! This module converts between JSON text and document values so that the
//! same configuration can read and write JSON as well as binary documents.
//!
//! # Example
//!
//! ```
//! use docmap::json::{from_json, to_json};
//!
//! let value = from_json(r#"{"name": "alice", "age": 30}"#).unwrap();
//! let text = to_json(&value).unwrap();
//! ```
//!
//! # Document to JSON Mapping
//!
//! | Document   | JSON                                     |
//! |------------|------------------------------------------|
//! | `null`     | null                                     |
//! | `bool`     | true/false                               |
//! | `int`      | integer                                  |
//! | `long`     | integer                                  |
//! | `double`   | number                                   |
//! | `string`   | string                                   |
//! | `binary`   | string with `b64:` prefix                |
//! | `objectId` | 24-digit hex string                      |
//! | `date`     | integer milliseconds since the epoch     |
//! | `array`    | array                                    |
//! | `document` | object                                   |
//! | other      | relaxed extended JSON                    |
//!
//! Reading maps integers to `int` when they fit 32 bits and `long`
//! otherwise, and `b64:`-prefixed strings holding valid base64 to `binary`.

use base64::Engine;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

const BINARY_PREFIX: &str = "b64:";

/// Parse JSON text into a document value.
///
/// # Errors
///
/// Returns `Error::Json` if the text is not valid JSON.
pub fn from_json(text: &str) -> Result<Bson> {
    let value: JsonValue = serde_json::from_str(text)?;
    Ok(json_to_bson(value))
}

/// Render a document value as compact JSON text.
///
/// # Errors
///
/// Returns `Error::NonFiniteFloat` if a double is NaN or Infinity.
pub fn to_json(value: &Bson) -> Result<String> {
    let json = bson_to_json(value)?;
    Ok(serde_json::to_string(&json)?)
}

/// Convert a parsed JSON value.
#[must_use]
pub fn json_to_bson(value: JsonValue) -> Bson {
    match value {
        JsonValue::Null => Bson::Null,

        JsonValue::Bool(b) => Bson::Boolean(b),

        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Bson::Int32(small),
                    Err(_) => Bson::Int64(i),
                }
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }

        JsonValue::String(s) => {
            if let Some(payload) = s.strip_prefix(BINARY_PREFIX)
                && let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(payload)
            {
                return Bson::Binary(Binary {
                    subtype: BinarySubtype::Generic,
                    bytes,
                });
            }
            Bson::String(s)
        }

        JsonValue::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),

        JsonValue::Object(obj) => Bson::Document(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_bson(v)))
                .collect::<Document>(),
        ),
    }
}

/// Convert a document value to a JSON value.
///
/// # Errors
///
/// Returns `Error::NonFiniteFloat` if a double is NaN or Infinity.
pub fn bson_to_json(value: &Bson) -> Result<JsonValue> {
    match value {
        Bson::Null | Bson::Undefined => Ok(JsonValue::Null),

        Bson::Boolean(b) => Ok(JsonValue::Bool(*b)),

        Bson::Int32(n) => Ok(JsonValue::Number((*n).into())),

        Bson::Int64(n) => Ok(JsonValue::Number((*n).into())),

        Bson::Double(f) => {
            let num = serde_json::Number::from_f64(*f).ok_or(Error::NonFiniteFloat(*f))?;
            Ok(JsonValue::Number(num))
        }

        Bson::String(s) | Bson::Symbol(s) => Ok(JsonValue::String(s.clone())),

        Bson::Binary(bin) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bin.bytes);
            Ok(JsonValue::String(format!("{BINARY_PREFIX}{encoded}")))
        }

        Bson::ObjectId(oid) => Ok(JsonValue::String(oid.to_hex())),

        Bson::DateTime(dt) => Ok(JsonValue::Number(dt.timestamp_millis().into())),

        Bson::Array(items) => items
            .iter()
            .map(bson_to_json)
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),

        Bson::Document(doc) => {
            let mut obj = serde_json::Map::new();
            for (key, value) in doc {
                obj.insert(key.clone(), bson_to_json(value)?);
            }
            Ok(JsonValue::Object(obj))
        }

        other => Ok(other.clone().into_relaxed_extjson()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::{DateTime, doc};

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(from_json("7").unwrap(), Bson::Int32(7));
        assert_eq!(from_json("4294967296").unwrap(), Bson::Int64(4_294_967_296));
        assert_eq!(from_json("1.5").unwrap(), Bson::Double(1.5));
    }

    #[test]
    fn test_from_json_object() {
        let value = from_json(r#"{"name": "robert", "tags": ["a", null]}"#).unwrap();
        assert_eq!(
            value,
            Bson::Document(doc! {"name": "robert", "tags": ["a", Bson::Null]})
        );
    }

    #[test]
    fn test_binary_prefix() {
        let value = from_json(r#""b64:AQID""#).unwrap();
        assert_eq!(
            value,
            Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: vec![1, 2, 3],
            })
        );
        assert_eq!(to_json(&value).unwrap(), r#""b64:AQID""#);

        // Not valid base64: stays text.
        assert_eq!(
            from_json(r#""b64:***""#).unwrap(),
            Bson::String("b64:***".into())
        );
    }

    #[test]
    fn test_plain_identifiers() {
        let oid = ObjectId::parse_str("504482e5e4b0d1b2c47fff66").unwrap();
        let value = Bson::Document(doc! {
            "_id": oid,
            "at": DateTime::from_millis(1000),
        });
        assert_eq!(
            to_json(&value).unwrap(),
            r#"{"_id":"504482e5e4b0d1b2c47fff66","at":1000}"#
        );
    }

    #[test]
    fn test_non_finite_float() {
        assert!(matches!(
            to_json(&Bson::Double(f64::NAN)),
            Err(Error::NonFiniteFloat(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(from_json("{"), Err(Error::Json(_))));
    }
}
