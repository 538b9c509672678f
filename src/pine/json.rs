//! JSON interop: a bijective encoding of JSON documents as tagged values.
//!
//! The migration driver serializes function arguments to JSON and
//! deserializes responses; the admin state endpoints exchange raw state JSON.
//! Both go through this codec. A JSON document encodes as a two-element list
//! `[kindString, payload]`:
//!
//! - `["null", []]`
//! - `["bool", True | False]`
//! - `["int", intBlob]`
//! - `["float", 8-byte IEEE-754 blob]`
//! - `["string", stringValue]`
//! - `["array", [encoded...]]`
//! - `["object", [[keyString, encoded], ...]]`
//!
//! Object keys render sorted on the way back out (serde_json's default map),
//! so re-serialized state JSON is deterministic.

use serde_json::{Map, Number};
use thiserror::Error;

use crate::pine::value::{
    Value, int_from_value, int_value, string_from_value, string_value,
};

#[derive(Debug, Error)]
pub enum JsonValueError {
    #[error("invalid JSON: {reason}")]
    Parse { reason: String },
    #[error("non-finite numbers cannot be encoded")]
    NonFiniteNumber,
    #[error("value is not an encoded JSON document: {reason}")]
    Decode { reason: String },
}

/// Parse a JSON string and encode it as a value.
pub fn value_from_json_str(json: &str) -> Result<Value, JsonValueError> {
    let document: serde_json::Value =
        serde_json::from_str(json).map_err(|e| JsonValueError::Parse {
            reason: e.to_string(),
        })?;
    value_from_json(&document)
}

/// Decode a value back into a JSON string.
pub fn json_str_from_value(value: &Value) -> Result<String, JsonValueError> {
    let document = json_from_value(value)?;
    serde_json::to_string(&document).map_err(|e| JsonValueError::Parse {
        reason: e.to_string(),
    })
}

pub fn value_from_json(document: &serde_json::Value) -> Result<Value, JsonValueError> {
    match document {
        serde_json::Value::Null => Ok(tagged("null", Value::empty_list())),
        serde_json::Value::Bool(b) => Ok(tagged("bool", Value::bool_value(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(tagged("int", int_value(i)))
            } else if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(JsonValueError::NonFiniteNumber);
                }
                Ok(tagged("float", Value::blob(f.to_be_bytes().to_vec())))
            } else {
                Err(JsonValueError::Parse {
                    reason: format!("number out of range: {n}"),
                })
            }
        }
        serde_json::Value::String(s) => Ok(tagged("string", string_value(s))),
        serde_json::Value::Array(items) => {
            let encoded = items
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tagged("array", Value::list(encoded)))
        }
        serde_json::Value::Object(entries) => {
            let encoded = entries
                .iter()
                .map(|(key, entry)| {
                    Ok(Value::list(vec![
                        string_value(key),
                        value_from_json(entry)?,
                    ]))
                })
                .collect::<Result<Vec<_>, JsonValueError>>()?;
            Ok(tagged("object", Value::list(encoded)))
        }
    }
}

pub fn json_from_value(value: &Value) -> Result<serde_json::Value, JsonValueError> {
    let items = value.as_list().ok_or_else(|| decode_error("not a list"))?;
    let [kind, payload] = items else {
        return Err(decode_error(&format!(
            "expected [kind, payload], got {} elements",
            items.len()
        )));
    };
    let kind = string_from_value(kind).ok_or_else(|| decode_error("kind is not a string"))?;

    match kind.as_str() {
        "null" => Ok(serde_json::Value::Null),
        "bool" => {
            if payload.is_true() {
                Ok(serde_json::Value::Bool(true))
            } else if *payload == Value::false_value() {
                Ok(serde_json::Value::Bool(false))
            } else {
                Err(decode_error("bool payload is not a canonical boolean"))
            }
        }
        "int" => {
            let n = int_from_value(payload).ok_or_else(|| decode_error("invalid integer blob"))?;
            Ok(serde_json::Value::Number(Number::from(n)))
        }
        "float" => {
            let bytes = payload
                .as_blob()
                .ok_or_else(|| decode_error("float payload is not a blob"))?;
            let bits: [u8; 8] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| decode_error("float payload is not 8 bytes"))?;
            let f = f64::from_be_bytes(bits);
            Number::from_f64(f)
                .map(serde_json::Value::Number)
                .ok_or(JsonValueError::NonFiniteNumber)
        }
        "string" => {
            let s = string_from_value(payload)
                .ok_or_else(|| decode_error("string payload is not a string value"))?;
            Ok(serde_json::Value::String(s))
        }
        "array" => {
            let items = payload
                .as_list()
                .ok_or_else(|| decode_error("array payload is not a list"))?;
            let decoded = items
                .iter()
                .map(json_from_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::Value::Array(decoded))
        }
        "object" => {
            let entries = payload
                .as_list()
                .ok_or_else(|| decode_error("object payload is not a list"))?;
            let mut map = Map::new();
            for entry in entries {
                let pair = entry
                    .as_list()
                    .ok_or_else(|| decode_error("object entry is not a pair"))?;
                let [key, entry_value] = pair else {
                    return Err(decode_error("object entry is not a two-element pair"));
                };
                let key = string_from_value(key)
                    .ok_or_else(|| decode_error("object key is not a string"))?;
                map.insert(key, json_from_value(entry_value)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        other => Err(decode_error(&format!("unknown kind tag: {other}"))),
    }
}

fn tagged(kind: &str, payload: Value) -> Value {
    Value::list(vec![string_value(kind), payload])
}

fn decode_error(reason: &str) -> JsonValueError {
    JsonValueError::Decode {
        reason: reason.to_string(),
    }
}
