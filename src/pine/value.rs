//! The universal value type: immutable, content-addressable blobs and lists.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Canonical boolean values shared with deployed applications.
pub const TRUE_BYTE: u8 = 4;
pub const FALSE_BYTE: u8 = 2;

const INT_SIGN_POSITIVE: u8 = 4;
const INT_SIGN_NEGATIVE: u8 = 2;

/// An immutable Pine value.
///
/// Values form a finite tree and are shared freely: cloning a `List` copies an
/// `Arc`, not the elements. Two values are equal iff their content hashes are
/// equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Blob(Bytes),
    List(Arc<[Value]>),
}

impl Value {
    pub fn blob(bytes: impl Into<Bytes>) -> Self {
        Value::Blob(bytes.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }

    pub fn empty_list() -> Self {
        Value::List(Arc::from([]))
    }

    pub fn true_value() -> Self {
        Value::Blob(Bytes::from_static(&[TRUE_BYTE]))
    }

    pub fn false_value() -> Self {
        Value::Blob(Bytes::from_static(&[FALSE_BYTE]))
    }

    pub fn bool_value(b: bool) -> Self {
        if b {
            Self::true_value()
        } else {
            Self::false_value()
        }
    }

    /// The asymmetric truth test: only the canonical `True` blob counts.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Blob(bytes) if bytes.as_ref() == [TRUE_BYTE])
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Value::Blob(bytes) => Some(bytes),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Blob(_) => None,
            Value::List(items) => Some(items),
        }
    }

    /// Content hash over the prefix-framed serialization.
    pub fn hash(&self) -> ValueHash {
        ValueHash(sha256(&self.framed_bytes()))
    }

    /// The canonical serialization of this node alone: the frame header plus
    /// either the blob bytes or the concatenated 32-byte child hashes. This is
    /// exactly what the content store persists per component.
    pub fn framed_bytes(&self) -> Vec<u8> {
        match self {
            Value::Blob(bytes) => {
                let mut framed = frame_header("blob", bytes.len());
                framed.extend_from_slice(bytes);
                framed
            }
            Value::List(items) => {
                let mut framed = frame_header("list", items.len());
                for item in items.iter() {
                    framed.extend_from_slice(&item.hash().0);
                }
                framed
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blob(bytes) => {
                write!(f, "Blob(0x")?;
                for b in bytes.iter() {
                    write!(f, "{b:02x}")?;
                }
                write!(f, ")")
            }
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

fn frame_header(kind: &str, len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(kind.len() + 24);
    header.extend_from_slice(kind.as_bytes());
    header.extend_from_slice(b" ");
    header.extend_from_slice(len.to_string().as_bytes());
    header.push(0);
    header
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    buf
}

/// SHA-256 over arbitrary bytes, as a [`ValueHash`]-compatible digest.
pub fn sha256_bytes(data: &[u8]) -> ValueHash {
    ValueHash(sha256(data))
}

/// The durable identifier of a value: SHA-256 of its framed serialization,
/// rendered lowercase-hex everywhere it crosses a file or wire boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueHash(pub [u8; 32]);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("hash must be 64 hex chars (got {got})")]
    Length { got: usize },
    #[error("hash contains invalid hex: {chunk}")]
    InvalidHex { chunk: String },
}

impl ValueHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != 64 {
            return Err(HashParseError::Length { got: s.len() });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| HashParseError::InvalidHex {
                chunk: format!("{chunk:?}"),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| HashParseError::InvalidHex {
                chunk: hex.to_string(),
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueHash({})", self.to_hex())
    }
}

impl fmt::Display for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ValueHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ValueHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ValueHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Encode a signed integer: one sign byte (`4` positive, `2` negative)
/// followed by the big-endian magnitude with no leading zeros. Zero has the
/// single canonical form of a lone positive sign byte.
pub fn int_value(n: i64) -> Value {
    let mut bytes = Vec::with_capacity(9);
    bytes.push(if n < 0 {
        INT_SIGN_NEGATIVE
    } else {
        INT_SIGN_POSITIVE
    });
    let magnitude = (n as i128).unsigned_abs();
    let be = magnitude.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    bytes.extend_from_slice(&be[first..]);
    Value::blob(bytes)
}

/// Decode a signed integer blob. Accepts non-canonical magnitudes (leading
/// zeros); returns `None` for non-blobs, an unknown sign byte, or a magnitude
/// outside the `i64` range.
pub fn int_from_value(value: &Value) -> Option<i64> {
    let bytes = value.as_blob()?;
    let (sign, magnitude) = bytes.split_first()?;
    let negative = match *sign {
        INT_SIGN_POSITIVE => false,
        INT_SIGN_NEGATIVE => true,
        _ => return None,
    };
    let mut acc: i128 = 0;
    for b in magnitude {
        acc = acc.checked_mul(256)?.checked_add(*b as i128)?;
        if acc > u64::MAX as i128 {
            return None;
        }
    }
    let signed = if negative { -acc } else { acc };
    i64::try_from(signed).ok()
}

/// Encode a string as a list of per-code-point blobs (UTF-32 big-endian).
pub fn string_value(s: &str) -> Value {
    let chars = s
        .chars()
        .map(|c| Value::blob((c as u32).to_be_bytes().to_vec()))
        .collect();
    Value::list(chars)
}

/// Decode a string value. Every element must be a 4-byte blob holding a valid
/// Unicode scalar value.
pub fn string_from_value(value: &Value) -> Option<String> {
    let items = value.as_list()?;
    let mut out = String::with_capacity(items.len());
    for item in items {
        let bytes = item.as_blob()?;
        let code: [u8; 4] = bytes.as_ref().try_into().ok()?;
        out.push(char::from_u32(u32::from_be_bytes(code))?);
    }
    Some(out)
}

/// JSON representation used when a value is embedded in a JSON document
/// (deployment artifacts, debugging output): `{"blob": "<hex>"}` or
/// `{"list": [...]}`.
#[derive(Serialize, Deserialize)]
enum ValueRepr {
    #[serde(rename = "blob")]
    Blob(String),
    #[serde(rename = "list")]
    List(Vec<ValueRepr>),
}

impl From<&Value> for ValueRepr {
    fn from(value: &Value) -> Self {
        match value {
            Value::Blob(bytes) => {
                ValueRepr::Blob(bytes.iter().map(|b| format!("{b:02x}")).collect())
            }
            Value::List(items) => ValueRepr::List(items.iter().map(ValueRepr::from).collect()),
        }
    }
}

impl TryFrom<ValueRepr> for Value {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        match repr {
            ValueRepr::Blob(hex) => {
                if hex.len() % 2 != 0 {
                    return Err(format!("blob hex has odd length {}", hex.len()));
                }
                let mut bytes = Vec::with_capacity(hex.len() / 2);
                for chunk in hex.as_bytes().chunks(2) {
                    let pair = std::str::from_utf8(chunk)
                        .map_err(|_| "blob hex contains invalid UTF-8".to_string())?;
                    bytes.push(
                        u8::from_str_radix(pair, 16)
                            .map_err(|_| format!("blob hex contains invalid hex: {pair}"))?,
                    );
                }
                Ok(Value::blob(bytes))
            }
            ValueRepr::List(items) => Ok(Value::list(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ValueRepr::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ValueRepr::deserialize(deserializer)?;
        Value::try_from(repr).map_err(serde::de::Error::custom)
    }
}
