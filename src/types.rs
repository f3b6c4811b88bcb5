//! Core type definitions for record members
//!
//! `FieldType` is the closed set of member types the filter engine understands,
//! `FieldValue` is a typed value read from a member or coerced from a JSON literal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Member types
// ============================================================================

/// Declared type of a record member
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 64-bit signed integer (maps to BIGINT)
    Integer,

    /// Exact decimal (maps to NUMERIC)
    Decimal,

    /// Text (maps to TEXT / VARCHAR)
    Text,

    /// Boolean (maps to BOOLEAN)
    Boolean,

    /// UTC timestamp (maps to TIMESTAMP WITH TIME ZONE)
    Timestamp,

    /// UUID (maps to UUID)
    Uuid,
}

impl FieldType {
    /// Human-readable type name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Uuid => "uuid",
        }
    }

    /// Whether text operators (contains, starts/ends with) apply to this type
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    /// Convert a JSON literal into a value of this type
    ///
    /// `null` is passed through as [`FieldValue::Null`]; whether null is
    /// acceptable is decided by the caller.
    pub fn coerce(&self, value: &serde_json::Value) -> Result<FieldValue, String> {
        use serde_json::Value;

        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        match (self, value) {
            (FieldType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| format!("Cannot convert {} to integer", n)),
            (FieldType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("Cannot convert '{}' to integer", s)),
            (FieldType::Decimal, Value::Number(n)) => parse_decimal(&n.to_string())
                .map(FieldValue::Decimal)
                .ok_or_else(|| format!("Cannot convert {} to decimal", n)),
            (FieldType::Decimal, Value::String(s)) => parse_decimal(s.trim())
                .map(FieldValue::Decimal)
                .ok_or_else(|| format!("Cannot convert '{}' to decimal", s)),
            (FieldType::Text, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
            (FieldType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (FieldType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(FieldValue::Boolean(true)),
                "false" | "0" | "no" => Ok(FieldValue::Boolean(false)),
                _ => Err(format!("Cannot convert '{}' to boolean", s)),
            },
            (FieldType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| FieldValue::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| format!("Invalid timestamp format: {}", e)),
            (FieldType::Uuid, Value::String(s)) => Uuid::parse_str(s)
                .map(FieldValue::Uuid)
                .map_err(|e| format!("Invalid uuid: {}", e)),
            _ => Err(format!("got {}", json_kind(value))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Short name of a JSON value's kind, for error messages
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================================
// Member values
// ============================================================================

/// A typed value read from a record member or coerced from a filter literal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Type of a non-null value
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(_) => Some(FieldType::Integer),
            FieldValue::Decimal(_) => Some(FieldType::Decimal),
            FieldValue::Text(_) => Some(FieldType::Text),
            FieldValue::Boolean(_) => Some(FieldType::Boolean),
            FieldValue::Timestamp(_) => Some(FieldType::Timestamp),
            FieldValue::Uuid(_) => Some(FieldType::Uuid),
        }
    }

    /// Short name of the value's kind, for error messages
    pub fn kind(&self) -> &'static str {
        self.field_type().map_or("null", |t| t.name())
    }

    /// Natural order between two values of the same type.
    ///
    /// Returns `None` when either side is null or the types differ. Text
    /// compares by byte order.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => Some(a.cmp(b)),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            (FieldValue::Uuid(a), FieldValue::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then natural order.
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Decimal(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "'{}'", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::Uuid(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        FieldValue::Decimal(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::Text(v.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(v: Option<V>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}
