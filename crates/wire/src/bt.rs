//! The length-prefixed dict encoding used by every quorum command.
//!
//! # Wire Format
//!
//! Four atomic types:
//!
//! ```text
//! integer      i<decimal>e          i42e, i-7e
//! byte string  <len>:<bytes>        4:spam
//! list         l<values…>e
//! dict         d<key><value>…e      keys are byte strings, ascending
//! ```
//!
//! Every command payload is a single dict whose keys are short ASCII
//! strings. Integers are parsed into `i128` internally so both the full
//! `u64` range (quorum checksums) and negative values round-trip; the typed
//! getters range-check on extraction.

use blink_types::{Hash, Signature};
use std::collections::BTreeMap;

/// Upper bound on a decoded message, preventing unbounded allocations.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum container nesting the decoder will follow.
const MAX_DEPTH: usize = 32;

/// Errors from decoding or field extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid encoding: {0}")]
    Invalid(&'static str),

    #[error("message is {actual} bytes, over the {max} byte limit")]
    TooLarge { actual: usize, max: usize },

    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("trailing bytes after the end of the value")]
    TrailingData,

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("wrong type for field {0}")]
    WrongType(&'static str),

    #[error("value out of range for field {0}")]
    OutOfRange(&'static str),

    #[error("invalid field {0}: {1}")]
    InvalidField(&'static str, &'static str),

    #[error("unrecognized key {0:?}")]
    UnknownKey(String),
}

/// A decoded dict: byte-string keys in ascending order.
pub type BtDict = BTreeMap<String, BtValue>;

/// A value in the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BtValue {
    Int(i128),
    Bytes(Vec<u8>),
    List(Vec<BtValue>),
    Dict(BtDict),
}

impl BtValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            BtValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BtValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BtValue]> {
        match self {
            BtValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BtDict> {
        match self {
            BtValue::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<u64> for BtValue {
    fn from(v: u64) -> Self {
        BtValue::Int(v as i128)
    }
}

impl From<i64> for BtValue {
    fn from(v: i64) -> Self {
        BtValue::Int(v as i128)
    }
}

impl From<bool> for BtValue {
    fn from(v: bool) -> Self {
        BtValue::Int(v as i128)
    }
}

impl From<&[u8]> for BtValue {
    fn from(v: &[u8]) -> Self {
        BtValue::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for BtValue {
    fn from(v: Vec<u8>) -> Self {
        BtValue::Bytes(v)
    }
}

impl From<&str> for BtValue {
    fn from(v: &str) -> Self {
        BtValue::Bytes(v.as_bytes().to_vec())
    }
}

impl From<&Hash> for BtValue {
    fn from(v: &Hash) -> Self {
        BtValue::Bytes(v.as_bytes().to_vec())
    }
}

impl From<&Signature> for BtValue {
    fn from(v: &Signature) -> Self {
        BtValue::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<BtValue>> for BtValue {
    fn from(v: Vec<BtValue>) -> Self {
        BtValue::List(v)
    }
}

impl From<BtDict> for BtValue {
    fn from(v: BtDict) -> Self {
        BtValue::Dict(v)
    }
}

/// Serialize a value.
pub fn encode(value: &BtValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BtValue, out: &mut Vec<u8>) {
    match value {
        BtValue::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BtValue::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        BtValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BtValue::Dict(entries) => {
            // BTreeMap iteration gives the required ascending key order.
            out.push(b'd');
            for (key, val) in entries {
                out.extend_from_slice(key.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(key.as_bytes());
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}

/// Parse a single value covering the whole input.
pub fn decode(data: &[u8]) -> Result<BtValue, WireError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(WireError::TooLarge {
            actual: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut input = data;
    let value = decode_value(&mut input, 0)?;
    if !input.is_empty() {
        return Err(WireError::TrailingData);
    }
    Ok(value)
}

fn peek(input: &[u8]) -> Result<u8, WireError> {
    input.first().copied().ok_or(WireError::UnexpectedEof)
}

fn take(input: &mut &[u8], n: usize) -> Result<Vec<u8>, WireError> {
    if input.len() < n {
        return Err(WireError::UnexpectedEof);
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head.to_vec())
}

fn decode_value(input: &mut &[u8], depth: usize) -> Result<BtValue, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::TooDeep);
    }
    match peek(input)? {
        b'i' => {
            *input = &input[1..];
            Ok(BtValue::Int(decode_int_body(input)?))
        }
        b'0'..=b'9' => Ok(BtValue::Bytes(decode_byte_string(input)?)),
        b'l' => {
            *input = &input[1..];
            let mut items = Vec::new();
            while peek(input)? != b'e' {
                items.push(decode_value(input, depth + 1)?);
            }
            *input = &input[1..];
            Ok(BtValue::List(items))
        }
        b'd' => {
            *input = &input[1..];
            let mut entries = BtDict::new();
            let mut last_key: Option<Vec<u8>> = None;
            while peek(input)? != b'e' {
                let key_bytes = decode_byte_string(input)?;
                if let Some(prev) = &last_key {
                    if *prev >= key_bytes {
                        return Err(WireError::Invalid("dict keys out of order"));
                    }
                }
                let key = String::from_utf8(key_bytes.clone())
                    .map_err(|_| WireError::Invalid("non-UTF-8 dict key"))?;
                let value = decode_value(input, depth + 1)?;
                entries.insert(key, value);
                last_key = Some(key_bytes);
            }
            *input = &input[1..];
            Ok(BtValue::Dict(entries))
        }
        _ => Err(WireError::Invalid("unexpected type prefix")),
    }
}

fn decode_int_body(input: &mut &[u8]) -> Result<i128, WireError> {
    let negative = peek(input)? == b'-';
    if negative {
        *input = &input[1..];
    }
    let mut digits = 0usize;
    let mut value: i128 = 0;
    loop {
        match peek(input)? {
            b @ b'0'..=b'9' => {
                if digits > 0 && value == 0 {
                    return Err(WireError::Invalid("integer with leading zero"));
                }
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add((b - b'0') as i128))
                    .ok_or(WireError::Invalid("integer overflow"))?;
                digits += 1;
                *input = &input[1..];
            }
            b'e' => {
                if digits == 0 {
                    return Err(WireError::Invalid("empty integer"));
                }
                if negative && value == 0 {
                    return Err(WireError::Invalid("negative zero"));
                }
                *input = &input[1..];
                return Ok(if negative { -value } else { value });
            }
            _ => return Err(WireError::Invalid("bad integer digit")),
        }
    }
}

fn decode_byte_string(input: &mut &[u8]) -> Result<Vec<u8>, WireError> {
    let mut len: usize = 0;
    let mut digits = 0usize;
    loop {
        match peek(input)? {
            b @ b'0'..=b'9' => {
                if digits > 0 && len == 0 {
                    return Err(WireError::Invalid("length with leading zero"));
                }
                len = len
                    .checked_mul(10)
                    .and_then(|l| l.checked_add((b - b'0') as usize))
                    .ok_or(WireError::Invalid("length overflow"))?;
                digits += 1;
                *input = &input[1..];
            }
            b':' => {
                if digits == 0 {
                    return Err(WireError::Invalid("empty length"));
                }
                *input = &input[1..];
                return take(input, len);
            }
            _ => return Err(WireError::Invalid("bad length digit")),
        }
    }
}

// Typed field extraction.

/// A required field of any type.
pub fn req_field<'a>(dict: &'a BtDict, key: &'static str) -> Result<&'a BtValue, WireError> {
    dict.get(key).ok_or(WireError::MissingField(key))
}

fn req_int(dict: &BtDict, key: &'static str) -> Result<i128, WireError> {
    req_field(dict, key)?
        .as_int()
        .ok_or(WireError::WrongType(key))
}

pub fn req_u64(dict: &BtDict, key: &'static str) -> Result<u64, WireError> {
    u64::try_from(req_int(dict, key)?).map_err(|_| WireError::OutOfRange(key))
}

pub fn req_u16(dict: &BtDict, key: &'static str) -> Result<u16, WireError> {
    u16::try_from(req_int(dict, key)?).map_err(|_| WireError::OutOfRange(key))
}

pub fn req_u8(dict: &BtDict, key: &'static str) -> Result<u8, WireError> {
    u8::try_from(req_int(dict, key)?).map_err(|_| WireError::OutOfRange(key))
}

/// An optional unsigned integer; absent maps to `None`.
pub fn opt_u64(dict: &BtDict, key: &'static str) -> Result<Option<u64>, WireError> {
    match dict.get(key) {
        None => Ok(None),
        Some(value) => {
            let i = value.as_int().ok_or(WireError::WrongType(key))?;
            u64::try_from(i)
                .map(Some)
                .map_err(|_| WireError::OutOfRange(key))
        }
    }
}

pub fn req_bytes<'a>(dict: &'a BtDict, key: &'static str) -> Result<&'a [u8], WireError> {
    req_field(dict, key)?
        .as_bytes()
        .ok_or(WireError::WrongType(key))
}

pub fn req_hash(dict: &BtDict, key: &'static str) -> Result<Hash, WireError> {
    Hash::from_slice(req_bytes(dict, key)?)
        .ok_or(WireError::InvalidField(key, "expected 32 bytes"))
}

pub fn req_signature(dict: &BtDict, key: &'static str) -> Result<Signature, WireError> {
    Signature::from_slice(req_bytes(dict, key)?)
        .ok_or(WireError::InvalidField(key, "expected 64 bytes"))
}

pub fn req_list<'a>(dict: &'a BtDict, key: &'static str) -> Result<&'a [BtValue], WireError> {
    req_field(dict, key)?
        .as_list()
        .ok_or(WireError::WrongType(key))
}
