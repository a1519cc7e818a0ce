//! Value coercion engine.
//!
//! [`change_type`] converts a raw column value into a value of a member's
//! declared [`TargetType`]. Conversions are locale-invariant and never
//! consult shared state.

use crate::error::MapError;
use crate::types::{EnumType, IntType, TargetType};
use crate::values::{hex_encode, EnumValue, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// Naive timestamp layouts accepted in text, ISO 8601 and PostgreSQL's.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Offset-carrying layouts PostgreSQL uses for `timestamptz` text.
const DATETIME_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Convert `value` to the given target type.
///
/// `is_nullable` is the nullable-reference annotation of the member being
/// populated. It only affects how `Value::Null` is converted for reference
/// targets.
pub fn change_type(
    value: Value,
    target: &TargetType,
    is_nullable: bool,
) -> Result<Value, MapError> {
    if value.is_null() {
        return null_value(target, is_nullable);
    }

    let target = target.underlying();
    if let TargetType::Enum(enum_type) = target {
        return to_enum(value, *enum_type);
    }
    if value.kind() == target.storage_kind() {
        return Ok(value);
    }
    convert(value, target)
}

/// The zero value of a value type, `None` for any other type.
pub fn zero_value(target: &TargetType) -> Option<Value> {
    let value = match target {
        TargetType::Bool => Value::Bool(false),
        TargetType::Char => Value::Char('\0'),
        TargetType::Int8 => Value::Int8(0),
        TargetType::Int16 => Value::Int16(0),
        TargetType::Int32 => Value::Int32(0),
        TargetType::Int64 => Value::Int64(0),
        TargetType::UInt8 => Value::UInt8(0),
        TargetType::UInt16 => Value::UInt16(0),
        TargetType::UInt32 => Value::UInt32(0),
        TargetType::UInt64 => Value::UInt64(0),
        TargetType::Float32 => Value::Float32(0.0),
        TargetType::Float64 => Value::Float64(0.0),
        TargetType::Decimal => Value::Decimal(Decimal::ZERO),
        TargetType::Uuid => Value::Uuid(Uuid::nil()),
        TargetType::Date => Value::Date(NaiveDate::default()),
        TargetType::Time => Value::Time(NaiveTime::default()),
        TargetType::DateTime => Value::DateTime(NaiveDateTime::default()),
        TargetType::DateTimeTz => Value::DateTimeTz(DateTime::<Utc>::default()),
        TargetType::Enum(enum_type) => Value::Enum(EnumValue::new(*enum_type, 0)),
        TargetType::Nullable(_)
        | TargetType::String
        | TargetType::Bytes
        | TargetType::Json
        | TargetType::Object(_) => return None,
    };
    Some(value)
}

fn null_value(target: &TargetType, is_nullable: bool) -> Result<Value, MapError> {
    match target {
        TargetType::Nullable(_) => Ok(Value::Null),
        TargetType::String | TargetType::Bytes | TargetType::Json | TargetType::Object(_)
            if is_nullable =>
        {
            Ok(Value::Null)
        }
        TargetType::String => Ok(Value::String(String::new())),
        TargetType::Bytes => Ok(Value::Bytes(Vec::new())),
        TargetType::Json => Ok(Value::Json(serde_json::Value::Null)),
        TargetType::Object(object) => object.default_instance(),
        value_type => zero_value(value_type)
            .ok_or_else(|| MapError::invalid(value_type, "type has no zero value")),
    }
}

// ============================================================================
// Enumerations
// ============================================================================

fn to_enum(value: Value, enum_type: &'static EnumType) -> Result<Value, MapError> {
    let raw = match value {
        Value::Enum(e) if e.enum_type() == enum_type => return Ok(Value::Enum(e)),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Some(raw) = enum_type.member_named(trimmed) {
                return Ok(Value::Enum(EnumValue::new(enum_type, raw)));
            }
            trimmed.parse::<i128>().map_err(|_| {
                MapError::invalid(
                    enum_type.name,
                    format!("requested value '{text}' was not found"),
                )
            })?
        }
        other => integer_of(&other, &TargetType::Enum(enum_type))?,
    };

    if !enum_type.repr.contains(raw) {
        return Err(MapError::out_of_range(enum_type.name, raw));
    }
    // u64 raw values above i64::MAX keep their bit pattern
    Ok(Value::Enum(EnumValue::new(enum_type, raw as i64)))
}

// ============================================================================
// Generic conversion
// ============================================================================

fn convert(value: Value, target: &TargetType) -> Result<Value, MapError> {
    if let Some(int_type) = target.int_type() {
        let n = integer_of(&value, target)?;
        return int_value(n, int_type, target);
    }

    match target {
        TargetType::Bool => to_bool(value, target),
        TargetType::Char => to_char(value, target),
        TargetType::Float32 => {
            let f = float_of(&value, target)?;
            if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                return Err(MapError::out_of_range(target, f));
            }
            Ok(Value::Float32(f as f32))
        }
        TargetType::Float64 => float_of(&value, target).map(Value::Float64),
        TargetType::Decimal => decimal_of(&value, target).map(Value::Decimal),
        TargetType::String => to_text(&value, target).map(Value::String),
        TargetType::Bytes => match value {
            Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(MapError::unexpected(&target.to_string(), &other)),
        },
        TargetType::Uuid => to_uuid(value, target),
        TargetType::Date => to_date(value, target),
        TargetType::Time => to_time(value, target),
        TargetType::DateTime => to_datetime(value, target),
        TargetType::DateTimeTz => to_datetime_tz(value, target),
        TargetType::Json => to_json(value, target),
        _ => Err(MapError::unexpected(&target.to_string(), &value)),
    }
}

/// Integer view of a value, truncating fractional numbers toward zero.
fn integer_of(value: &Value, target: &TargetType) -> Result<i128, MapError> {
    match value {
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Char(c) => Ok(i128::from(u32::from(*c))),
        Value::Int8(i) => Ok((*i).into()),
        Value::Int16(i) => Ok((*i).into()),
        Value::Int32(i) => Ok((*i).into()),
        Value::Int64(i) => Ok((*i).into()),
        Value::UInt8(i) => Ok((*i).into()),
        Value::UInt16(i) => Ok((*i).into()),
        Value::UInt32(i) => Ok((*i).into()),
        Value::UInt64(i) => Ok((*i).into()),
        Value::Float32(f) => float_to_integer(f64::from(*f), target),
        Value::Float64(f) => float_to_integer(*f, target),
        Value::Decimal(d) => decimal_to_integer(*d, target),
        Value::Enum(e) => Ok(match e.enum_type().repr {
            IntType::UInt64 => i128::from(e.raw() as u64),
            _ => i128::from(e.raw()),
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i128>() {
                return Ok(n);
            }
            match Decimal::from_str(trimmed) {
                Ok(d) => decimal_to_integer(d, target),
                Err(_) => Err(MapError::format(target, s.as_str())),
            }
        }
        other => Err(MapError::unexpected(&target.to_string(), other)),
    }
}

fn float_to_integer(f: f64, target: &TargetType) -> Result<i128, MapError> {
    if !f.is_finite() {
        return Err(MapError::invalid(target, format!("{f} is not a finite number")));
    }
    // Saturating cast; the caller's range check rejects saturated values
    Ok(f.trunc() as i128)
}

fn decimal_to_integer(d: Decimal, target: &TargetType) -> Result<i128, MapError> {
    d.trunc()
        .to_i128()
        .ok_or_else(|| MapError::out_of_range(target, d))
}

fn int_value(n: i128, int_type: IntType, target: &TargetType) -> Result<Value, MapError> {
    if !int_type.contains(n) {
        return Err(MapError::out_of_range(target, n));
    }
    Ok(match int_type {
        IntType::Int8 => Value::Int8(n as i8),
        IntType::Int16 => Value::Int16(n as i16),
        IntType::Int32 => Value::Int32(n as i32),
        IntType::Int64 => Value::Int64(n as i64),
        IntType::UInt8 => Value::UInt8(n as u8),
        IntType::UInt16 => Value::UInt16(n as u16),
        IntType::UInt32 => Value::UInt32(n as u32),
        IntType::UInt64 => Value::UInt64(n as u64),
    })
}

fn float_of(value: &Value, target: &TargetType) -> Result<f64, MapError> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Float32(f) => Ok(f64::from(*f)),
        Value::Float64(f) => Ok(*f),
        Value::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| MapError::out_of_range(target, d)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| MapError::format(target, s.as_str())),
        other => match other.as_i64() {
            Some(i) => Ok(i as f64),
            None => match other {
                Value::UInt64(u) => Ok(*u as f64),
                _ => Err(MapError::unexpected(&target.to_string(), other)),
            },
        },
    }
}

fn decimal_of(value: &Value, target: &TargetType) -> Result<Decimal, MapError> {
    match value {
        Value::Bool(b) => Ok(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::Float32(f) => {
            Decimal::from_f32(*f).ok_or_else(|| MapError::out_of_range(target, f))
        }
        Value::Float64(f) => {
            Decimal::from_f64(*f).ok_or_else(|| MapError::out_of_range(target, f))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|_| MapError::format(target, s.as_str()))
        }
        Value::Int8(_)
        | Value::Int16(_)
        | Value::Int32(_)
        | Value::Int64(_)
        | Value::UInt8(_)
        | Value::UInt16(_)
        | Value::UInt32(_)
        | Value::UInt64(_) => {
            let n = integer_of(value, target)?;
            Decimal::from_i128(n).ok_or_else(|| MapError::out_of_range(target, n))
        }
        other => Err(MapError::unexpected(&target.to_string(), other)),
    }
}

fn to_bool(value: Value, target: &TargetType) -> Result<Value, MapError> {
    let b = match &value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                true
            } else if trimmed.eq_ignore_ascii_case("false") {
                false
            } else {
                return Err(MapError::format(target, s.as_str()));
            }
        }
        Value::Float32(f) => *f != 0.0,
        Value::Float64(f) => *f != 0.0,
        Value::Decimal(d) => !d.is_zero(),
        Value::Char(_) => return Err(MapError::unexpected(&target.to_string(), &value)),
        other => integer_of(other, target)? != 0,
    };
    Ok(Value::Bool(b))
}

fn to_char(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(MapError::format(target, s)),
            }
        }
        Value::Int8(_)
        | Value::Int16(_)
        | Value::Int32(_)
        | Value::Int64(_)
        | Value::UInt8(_)
        | Value::UInt16(_)
        | Value::UInt32(_)
        | Value::UInt64(_) => {
            let n = integer_of(&value, target)?;
            u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or_else(|| MapError::out_of_range(target, n))
        }
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

/// Invariant text rendering of a scalar.
fn to_text(value: &Value, target: &TargetType) -> Result<String, MapError> {
    let text = match value {
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Int8(i) => i.to_string(),
        Value::Int16(i) => i.to_string(),
        Value::Int32(i) => i.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::UInt8(i) => i.to_string(),
        Value::UInt16(i) => i.to_string(),
        Value::UInt32(i) => i.to_string(),
        Value::UInt64(i) => i.to_string(),
        Value::Float32(f) => f.to_string(),
        Value::Float64(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => s.clone(),
        Value::Uuid(u) => u.hyphenated().to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Value::DateTimeTz(dt) => dt.to_rfc3339(),
        Value::Json(j) => j.to_string(),
        Value::Enum(e) => e.to_string(),
        other => return Err(MapError::unexpected(&target.to_string(), other)),
    };
    Ok(text)
}

fn to_uuid(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim())
            .map(Value::Uuid)
            .map_err(|_| MapError::format(target, s)),
        Value::Bytes(b) => Uuid::from_slice(&b).map(Value::Uuid).map_err(|_| {
            MapError::invalid(target, format!("expected 16 bytes, got {}", hex_encode(&b)))
        }),
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

// ============================================================================
// Temporal conversion
// ============================================================================

/// Parse a timestamp, reading naive layouts as UTC.
fn parse_datetime_utc(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    parse_naive_datetime(text).map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn to_date(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::DateTime(dt) => Ok(Value::Date(dt.date())),
        Value::DateTimeTz(dt) => Ok(Value::Date(dt.date_naive())),
        Value::String(s) => {
            let trimmed = s.trim();
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_datetime_utc(trimmed).map(|dt| dt.date_naive()))
                .map(Value::Date)
                .ok_or_else(|| MapError::format(target, s.as_str()))
        }
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

fn to_time(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::DateTime(dt) => Ok(Value::Time(dt.time())),
        Value::DateTimeTz(dt) => Ok(Value::Time(dt.time())),
        Value::String(s) => {
            let trimmed = s.trim();
            TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
                .map(Value::Time)
                .ok_or_else(|| MapError::format(target, s.as_str()))
        }
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

fn to_datetime(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::default()))),
        Value::DateTimeTz(dt) => Ok(Value::DateTime(dt.naive_utc())),
        Value::String(s) => {
            let trimmed = s.trim();
            parse_naive_datetime(trimmed)
                .or_else(|| parse_datetime_utc(trimmed).map(|dt| dt.naive_utc()))
                .map(Value::DateTime)
                .ok_or_else(|| MapError::format(target, s.as_str()))
        }
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

fn to_datetime_tz(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::Date(d) => Ok(Value::DateTimeTz(DateTime::from_naive_utc_and_offset(
            d.and_time(NaiveTime::default()),
            Utc,
        ))),
        Value::DateTime(dt) => Ok(Value::DateTimeTz(DateTime::from_naive_utc_and_offset(
            dt, Utc,
        ))),
        Value::String(s) => parse_datetime_utc(s.trim())
            .map(Value::DateTimeTz)
            .ok_or_else(|| MapError::format(target, s)),
        other => Err(MapError::unexpected(&target.to_string(), &other)),
    }
}

fn to_json(value: Value, target: &TargetType) -> Result<Value, MapError> {
    match value {
        Value::String(s) => serde_json::from_str(&s)
            .map(Value::Json)
            .map_err(|_| MapError::format(target, s)),
        Value::Bytes(_) => Err(MapError::unexpected(&target.to_string(), &value)),
        other => serde_json::to_value(&other)
            .map(Value::Json)
            .map_err(|e| MapError::invalid(target, e.to_string())),
    }
}
