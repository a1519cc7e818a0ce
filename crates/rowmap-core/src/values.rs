//! Runtime values.
//!
//! `Value` is the tagged representation of both raw column values read from
//! a row and coerced member values handed to entity setters. `Value::Null`
//! is the single database-null marker.

use crate::error::MapError;
use crate::types::EnumType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Ordered, string-keyed property map used for schema-less rows.
pub type DynamicBag = IndexMap<String, Value>;

/// A column or member value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Database null
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Unicode scalar value
    Char(char),
    /// 8-bit signed integer
    Int8(i8),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 8-bit unsigned integer
    UInt8(u8),
    /// 16-bit unsigned integer
    UInt16(u16),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 64-bit unsigned integer
    UInt64(u64),
    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),
    /// Exact decimal
    Decimal(Decimal),
    /// Text
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID value
    Uuid(Uuid),
    /// Date only
    Date(NaiveDate),
    /// Time only
    Time(NaiveTime),
    /// Timestamp without timezone
    DateTime(NaiveDateTime),
    /// Timestamp in UTC
    DateTimeTz(DateTime<Utc>),
    /// JSON document
    Json(serde_json::Value),
    /// Enumeration value
    Enum(EnumValue),
    /// Array of values
    Array(Vec<Value>),
    /// Ordered map of values
    Map(DynamicBag),
}

/// Payload-less discriminant of [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Json,
    Enum,
    Array,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::DateTimeTz => "datetimetz",
            Self::Json => "json",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// A raw enumeration value tagged with its enumeration type.
///
/// The raw value is not required to match a named member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    enum_type: &'static EnumType,
    raw: i64,
}

impl EnumValue {
    pub fn new(enum_type: &'static EnumType, raw: i64) -> Self {
        Self { enum_type, raw }
    }

    pub fn enum_type(&self) -> &'static EnumType {
        self.enum_type
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    /// Name of the matching member, if any.
    pub fn name(&self) -> Option<&'static str> {
        self.enum_type.name_of(self.raw)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.raw),
        }
    }
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Char(_) => ValueKind::Char,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::DateTimeTz(_) => ValueKind::DateTimeTz,
            Self::Json(_) => ValueKind::Json,
            Self::Enum(_) => ValueKind::Enum,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an i64, widening smaller integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(i) => Some((*i).into()),
            Self::Int16(i) => Some((*i).into()),
            Self::Int32(i) => Some((*i).into()),
            Self::Int64(i) => Some(*i),
            Self::UInt8(i) => Some((*i).into()),
            Self::UInt16(i) => Some((*i).into()),
            Self::UInt32(i) => Some((*i).into()),
            Self::UInt64(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Char(c) => serializer.serialize_char(*c),
            Self::Int8(i) => serializer.serialize_i8(*i),
            Self::Int16(i) => serializer.serialize_i16(*i),
            Self::Int32(i) => serializer.serialize_i32(*i),
            Self::Int64(i) => serializer.serialize_i64(*i),
            Self::UInt8(i) => serializer.serialize_u8(*i),
            Self::UInt16(i) => serializer.serialize_u16(*i),
            Self::UInt32(i) => serializer.serialize_u32(*i),
            Self::UInt64(i) => serializer.serialize_u64(*i),
            Self::Float32(f) => serializer.serialize_f32(*f),
            Self::Float64(f) => serializer.serialize_f64(*f),
            // Decimals keep their exact digits as text
            Self::Decimal(d) => serializer.serialize_str(&d.to_string()),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_str(&hex_encode(b)),
            Self::Uuid(u) => serializer.serialize_str(&u.to_string()),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => serializer.serialize_str(&t.format("%H:%M:%S%.f").to_string()),
            Self::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Self::DateTimeTz(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::Json(j) => j.serialize(serializer),
            Self::Enum(e) => match e.name() {
                Some(name) => serializer.serialize_str(name),
                None => serializer.serialize_i64(e.raw()),
            },
            Self::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Self::Map(bag) => {
                let mut map = serializer.serialize_map(Some(bag.len()))?;
                for (key, value) in bag {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Hex encode bytes.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ============================================================================
// Typed extraction
// ============================================================================

/// Conversion from a coerced [`Value`] into a Rust member type.
///
/// Setters call this after the coercion engine has produced a value of the
/// member's declared type, so a kind mismatch here means the member was
/// declared with the wrong [`TargetType`](crate::TargetType).
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, MapError>;
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, MapError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(MapError::unexpected(stringify!($ty), &other)),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    char => Char,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeTz,
    serde_json::Value => Json,
    EnumValue => Enum,
    Vec<Value> => Array,
    DynamicBag => Map,
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, MapError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, MapError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::Bool(true).as_i64(), None);
        assert_eq!(Value::Float64(1.5).kind(), ValueKind::Float64);
    }

    #[test]
    fn test_typed_extraction() {
        assert_eq!(i32::from_value(Value::Int32(7)).unwrap(), 7);
        assert_eq!(
            Option::<String>::from_value(Value::Null).unwrap(),
            None
        );
        assert_eq!(
            Option::<String>::from_value(Value::from("x")).unwrap(),
            Some("x".to_string())
        );

        let err = i32::from_value(Value::Int64(7)).unwrap_err();
        assert!(matches!(err, MapError::InvalidArgument { .. }));
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i16)), Value::Int16(3));
    }

    #[test]
    fn test_serialize_to_json() {
        let mut bag = DynamicBag::new();
        bag.insert("id".to_string(), Value::Int32(1));
        bag.insert("name".to_string(), Value::from("Ada"));
        bag.insert("missing".to_string(), Value::Null);
        bag.insert("blob".to_string(), Value::Bytes(vec![0xde, 0xad]));
        bag.insert(
            "price".to_string(),
            Value::Decimal(Decimal::new(12345, 2)),
        );

        let json = serde_json::to_string(&Value::Map(bag)).unwrap();
        assert_eq!(
            json,
            r#"{"id":1,"name":"Ada","missing":null,"blob":"dead","price":"123.45"}"#
        );
    }
}
