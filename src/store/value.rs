//! Typed values.
//!
//! A [`TypedValue`] carries exactly one active tag. Values arrive from the
//! gateway as JSON; [`parse`] converts them under a declared type and
//! [`TypedValue::infer`] derives the tag from the JSON shape when no type is
//! declared. Reads hand back the stored tag unchanged.

use crate::core::error::{CofferError, CofferResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Deepest list/dict nesting a value may have. A scalar sits at depth 0
/// only when it is the whole value; each enclosing container adds one.
pub const MAX_NESTING: usize = 64;

/// One past the largest `i64`, exactly representable as `f64`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Type tag of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
    List,
    Dict,
    Binary,
}

impl ValueType {
    /// Tag name as reported to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Binary => "binary",
        }
    }

    /// Snapshot tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Int => 1,
            Self::Float => 2,
            Self::Bool => 3,
            Self::Str => 4,
            Self::List => 5,
            Self::Dict => 6,
            Self::Binary => 7,
        }
    }

    /// Type for a snapshot tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            3 => Some(Self::Bool),
            4 => Some(Self::Str),
            5 => Some(Self::List),
            6 => Some(Self::Dict),
            7 => Some(Self::Binary),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValueType {
    type Err = CofferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "str" | "string" => Ok(Self::Str),
            "list" => Ok(Self::List),
            "dict" => Ok(Self::Dict),
            "binary" => Ok(Self::Binary),
            other => Err(CofferError::type_conversion(other, "unsupported type")),
        }
    }
}

/// Binary payload with its upload metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw bytes.
    pub data: Bytes,
    /// MIME content type.
    pub content_type: String,
    /// Original filename, when the upload carried one.
    pub filename: Option<String>,
}

impl Blob {
    /// Create a blob without a filename.
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            filename: None,
        }
    }

    /// Attach the original filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A stored value with exactly one active tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<TypedValue>),
    Dict(BTreeMap<String, TypedValue>),
    Blob(Blob),
}

impl TypedValue {
    /// The active tag.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Bool,
            Self::Str(_) => ValueType::Str,
            Self::List(_) => ValueType::List,
            Self::Dict(_) => ValueType::Dict,
            Self::Blob(_) => ValueType::Binary,
        }
    }

    /// Bytes metered against the tenant quota (blobs only).
    pub fn metered_size(&self) -> u64 {
        match self {
            Self::Blob(blob) => blob.size(),
            _ => 0,
        }
    }

    /// Borrow the blob payload, if this is a blob.
    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// Derive the tag from the JSON shape of the input.
    ///
    /// Containers nested deeper than [`MAX_NESTING`] are rejected.
    pub fn infer(input: &JsonValue) -> CofferResult<Self> {
        Self::infer_at(input, 0)
    }

    fn infer_at(input: &JsonValue, depth: usize) -> CofferResult<Self> {
        if depth > MAX_NESTING {
            return Err(CofferError::type_conversion(
                "inferred",
                format!("value nested deeper than {} levels", MAX_NESTING),
            ));
        }
        match input {
            JsonValue::Null => Err(CofferError::type_conversion(
                "inferred",
                "null values cannot be stored",
            )),
            JsonValue::Bool(b) => Ok(Self::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| CofferError::type_conversion("inferred", "unrepresentable number")),
            },
            JsonValue::String(s) => Ok(Self::Str(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| Self::infer_at(item, depth + 1))
                .collect::<CofferResult<Vec<_>>>()
                .map(Self::List),
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), Self::infer_at(v, depth + 1)?)))
                .collect::<CofferResult<BTreeMap<_, _>>>()
                .map(Self::Dict),
        }
    }

    /// Render as JSON. Blob payloads are base64-encoded.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Dict(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Blob(blob) => {
                use base64::Engine;
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(&blob.data))
            }
        }
    }
}

/// Convert input under an optional declared type name.
///
/// `None` infers the tag from the input's JSON shape.
pub fn parse_declared(declared: Option<&str>, input: &JsonValue) -> CofferResult<TypedValue> {
    match declared {
        Some(name) => parse(name.parse()?, input),
        None => TypedValue::infer(input),
    }
}

/// Convert input to the declared type.
///
/// Textual input is parsed; native JSON input of a compatible shape is
/// accepted directly. Anything else is a `TypeConversion` error.
pub fn parse(declared: ValueType, input: &JsonValue) -> CofferResult<TypedValue> {
    match declared {
        ValueType::Int => parse_int(input).map(TypedValue::Int),
        ValueType::Float => parse_float(input).map(TypedValue::Float),
        ValueType::Bool => parse_bool(input).map(TypedValue::Bool),
        ValueType::Str => parse_str(input).map(TypedValue::Str),
        ValueType::List => match parse_textual_json(ValueType::List, input)? {
            items @ JsonValue::Array(_) => TypedValue::infer(&items),
            other => Err(mismatch(ValueType::List, &other)),
        },
        ValueType::Dict => match parse_textual_json(ValueType::Dict, input)? {
            map @ JsonValue::Object(_) => TypedValue::infer(&map),
            other => Err(mismatch(ValueType::Dict, &other)),
        },
        ValueType::Binary => Err(CofferError::type_conversion(
            ValueType::Binary.as_str(),
            "binary values are stored through the blob upload path",
        )),
    }
}

fn parse_int(input: &JsonValue) -> CofferResult<i64> {
    match input {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            // Integral floats such as 3.0 are accepted; 3.5 is not.
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < I64_UPPER_BOUND => {
                    Ok(f as i64)
                }
                _ => Err(mismatch(ValueType::Int, input)),
            }
        }
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| CofferError::type_conversion("int", format!("'{}': {}", s, e))),
        JsonValue::Bool(b) => Ok(i64::from(*b)),
        _ => Err(mismatch(ValueType::Int, input)),
    }
}

fn parse_float(input: &JsonValue) -> CofferResult<f64> {
    let value = match input {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| mismatch(ValueType::Float, input))?,
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| CofferError::type_conversion("float", format!("'{}': {}", s, e)))?,
        JsonValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return Err(mismatch(ValueType::Float, input)),
    };
    if !value.is_finite() {
        return Err(CofferError::type_conversion(
            "float",
            "non-finite floats cannot be stored",
        ));
    }
    Ok(value)
}

fn parse_bool(input: &JsonValue) -> CofferResult<bool> {
    match input {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(mismatch(ValueType::Bool, input)),
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(CofferError::type_conversion(
                "bool",
                format!("'{}' is not a boolean literal", s),
            )),
        },
        _ => Err(mismatch(ValueType::Bool, input)),
    }
}

fn parse_str(input: &JsonValue) -> CofferResult<String> {
    match input {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Null => Err(mismatch(ValueType::Str, input)),
        other => Ok(other.to_string()),
    }
}

/// Decode JSON carried inside a string; pass native JSON through.
fn parse_textual_json(declared: ValueType, input: &JsonValue) -> CofferResult<JsonValue> {
    match input {
        JsonValue::String(s) => serde_json::from_str(s)
            .map_err(|e| CofferError::type_conversion(declared.as_str(), e.to_string())),
        other => Ok(other.clone()),
    }
}

fn mismatch(declared: ValueType, input: &JsonValue) -> CofferError {
    CofferError::type_conversion(
        declared.as_str(),
        format!("incompatible input of JSON kind {}", json_kind(input)),
    )
}

fn json_kind(input: &JsonValue) -> &'static str {
    match input {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
