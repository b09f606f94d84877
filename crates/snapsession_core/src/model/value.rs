//! Column value model shared by mapping, tracking and flush.
//!
//! # Responsibility
//! - Represent one column value independently of the SQLite client types.
//! - Convert raw SQLite column values into the storage class a field expects.
//! - Convert values into Rust field types through `FromValue`.
//!
//! # Invariants
//! - `Value` equality is plain value equality; `Null` never equals a non-null.
//! - Timestamps are always held as `chrono::NaiveDateTime` in memory.

use chrono::{DateTime, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TIMESTAMP_TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Storage class a mapped field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Blob,
    /// Date-time; stored as SQLite `TEXT` or unix seconds.
    Timestamp,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Timestamp => "timestamp",
        }
    }
}

/// One column value as seen by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Short storage-class name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts a raw SQLite column into the storage class `expected`.
    ///
    /// Database-native timestamps (`TEXT` date-times or integer unix seconds)
    /// become `Value::Timestamp`. Integers widen into `Real` fields.
    pub fn from_column(raw: ValueRef<'_>, expected: FieldType) -> Result<Self, ValueError> {
        let mismatch = |found: &'static str| ValueError {
            expected,
            found: found.to_string(),
        };

        match (raw, expected) {
            (ValueRef::Null, _) => Ok(Self::Null),
            (ValueRef::Integer(value), FieldType::Integer) => Ok(Self::Integer(value)),
            (ValueRef::Integer(value), FieldType::Real) => Ok(Self::Real(value as f64)),
            (ValueRef::Integer(seconds), FieldType::Timestamp) => DateTime::from_timestamp(seconds, 0)
                .map(|moment| Self::Timestamp(moment.naive_utc()))
                .ok_or_else(|| mismatch("out-of-range unix timestamp")),
            (ValueRef::Real(value), FieldType::Real) => Ok(Self::Real(value)),
            (ValueRef::Text(bytes), FieldType::Text) => std::str::from_utf8(bytes)
                .map(|text| Self::Text(text.to_string()))
                .map_err(|_| mismatch("non-utf8 text")),
            (ValueRef::Text(bytes), FieldType::Timestamp) => {
                let text = std::str::from_utf8(bytes).map_err(|_| mismatch("non-utf8 text"))?;
                parse_timestamp(text)
                    .map(Self::Timestamp)
                    .ok_or_else(|| mismatch("unparseable timestamp text"))
            }
            (ValueRef::Blob(bytes), FieldType::Blob) => Ok(Self::Blob(bytes.to_vec())),
            (ValueRef::Integer(_), _) => Err(mismatch("integer")),
            (ValueRef::Real(_), _) => Err(mismatch("real")),
            (ValueRef::Text(_), _) => Err(mismatch("text")),
            (ValueRef::Blob(_), _) => Err(mismatch("blob")),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    TIMESTAMP_TEXT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

/// A value did not match the storage class a field expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError {
    pub expected: FieldType,
    pub found: String,
}

impl ValueError {
    pub fn new(expected: FieldType, value: &Value) -> Self {
        Self {
            expected,
            found: value.type_name().to_string(),
        }
    }
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {} value, found {}",
            self.expected.as_str(),
            self.found
        )
    }
}

impl Error for ValueError {}

/// Conversion from a column value into a Rust field type.
///
/// Implemented for the scalar types entities usually hold, and for `Option<T>`
/// so nullable columns map onto optional fields.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(inner) => Ok(inner),
            other => Err(ValueError::new(FieldType::Integer, &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(inner) => i32::try_from(inner).map_err(|_| ValueError {
                expected: FieldType::Integer,
                found: format!("integer {inner} out of i32 range"),
            }),
            other => Err(ValueError::new(FieldType::Integer, &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Real(inner) => Ok(inner),
            Value::Integer(inner) => Ok(inner as f64),
            other => Err(ValueError::new(FieldType::Real, &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(ValueError {
                expected: FieldType::Integer,
                found: format!("{} (expected 0 or 1)", other.type_name()),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(inner) => Ok(inner),
            other => Err(ValueError::new(FieldType::Text, &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Blob(inner) => Ok(inner),
            other => Err(ValueError::new(FieldType::Blob, &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(inner) => Ok(inner),
            other => Err(ValueError::new(FieldType::Timestamp, &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Primary-key value of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Integer(i64),
    Text(String),
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(value) => Ok(ToSqlOutput::from(*value)),
            Self::Text(value) => Ok(ToSqlOutput::from(value.as_str())),
        }
    }
}
