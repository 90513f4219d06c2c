//! The tagged wire-value variant and its total conversion function.
//!
//! Design note: dynamic construction of typed values from a wire-type
//! string is modeled as one tagged enum with one total conversion
//! function, not as runtime dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed sentinel literal published for an endpoint that failed to read
/// in the most recent poll cycle.
pub const READ_ERROR_SENTINEL: &str = "READ_ERROR";

/// A single typed value from the closed wire-type set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum WireValue {
    Bool(bool),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    F32(f32),
    #[serde(rename = "string")]
    Str(String),
}

impl WireValue {
    /// The wire-type tag string, matching the closed set in the data model.
    pub fn tag(&self) -> &'static str {
        match self {
            WireValue::Bool(_) => "bool",
            WireValue::U8(_) => "u8",
            WireValue::I16(_) => "i16",
            WireValue::U16(_) => "u16",
            WireValue::I32(_) => "i32",
            WireValue::U32(_) => "u32",
            WireValue::I64(_) => "i64",
            WireValue::F32(_) => "f32",
            WireValue::Str(_) => "string",
        }
    }

    /// The sentinel read-error value, carrying `type="string"`.
    pub fn read_error() -> Self {
        WireValue::Str(READ_ERROR_SENTINEL.to_string())
    }

    /// Construct a `WireValue` from a wire-type tag and a raw numeric
    /// or string payload. The single total conversion point the design
    /// notes ask for; unsupported tags return `None` rather than
    /// panicking, so a bad config fails one variable, not the process.
    pub fn from_tagged(tag: &str, raw: &str) -> Option<Self> {
        match tag {
            "bool" => raw.parse::<bool>().ok().map(WireValue::Bool),
            "u8" => raw.parse::<u8>().ok().map(WireValue::U8),
            "i16" => raw.parse::<i16>().ok().map(WireValue::I16),
            "u16" => raw.parse::<u16>().ok().map(WireValue::U16),
            "i32" => raw.parse::<i32>().ok().map(WireValue::I32),
            "u32" => raw.parse::<u32>().ok().map(WireValue::U32),
            "i64" => raw.parse::<i64>().ok().map(WireValue::I64),
            "f32" => raw.parse::<f32>().ok().map(WireValue::F32),
            "string" => Some(WireValue::Str(raw.to_string())),
            _ => None,
        }
    }

    /// Best-effort numeric projection, used by acceptance/mapping
    /// constraint evaluation which only ever compares numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            WireValue::U8(v) => Some(*v as f64),
            WireValue::I16(v) => Some(*v as f64),
            WireValue::U16(v) => Some(*v as f64),
            WireValue::I32(v) => Some(*v as f64),
            WireValue::U32(v) => Some(*v as f64),
            WireValue::I64(v) => Some(*v as f64),
            WireValue::F32(v) => Some(*v as f64),
            WireValue::Str(s) => s.parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Bool(v) => write!(f, "{v}"),
            WireValue::U8(v) => write!(f, "{v}"),
            WireValue::I16(v) => write!(f, "{v}"),
            WireValue::U16(v) => write!(f, "{v}"),
            WireValue::I32(v) => write!(f, "{v}"),
            WireValue::U32(v) => write!(f, "{v}"),
            WireValue::I64(v) => write!(f, "{v}"),
            WireValue::F32(v) => write!(f, "{v}"),
            WireValue::Str(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tagged_round_trips_supported_tags() {
        assert_eq!(WireValue::from_tagged("bool", "true"), Some(WireValue::Bool(true)));
        assert_eq!(WireValue::from_tagged("u16", "42"), Some(WireValue::U16(42)));
        assert_eq!(
            WireValue::from_tagged("string", "hello"),
            Some(WireValue::Str("hello".to_string()))
        );
    }

    #[test]
    fn from_tagged_rejects_unknown_tag() {
        assert_eq!(WireValue::from_tagged("decimal128", "1"), None);
    }

    #[test]
    fn read_error_carries_string_type() {
        let v = WireValue::read_error();
        assert_eq!(v.tag(), "string");
    }
}
