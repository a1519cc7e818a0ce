//! Reverse conversion: PostgreSQL column → Value
//!
//! This module reads columns of a `tokio_postgres::Row` into rowmap-core's
//! `Value` according to each column's PostgreSQL type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_types::{FromSql, Type};
use rowmap_core::{MapError, TargetType, Value};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_postgres::Row;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Errors that can occur while converting between PostgreSQL and `Value`.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The column type is not supported
    #[error("Unsupported PostgreSQL type: {0}")]
    UnsupportedType(String),

    /// The driver could not decode a column
    #[error("Failed to decode column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A column value did not match its declared type's binary format
    #[error("Malformed {pg_type} value: {source}")]
    Malformed {
        pg_type: String,
        #[source]
        source: BoxError,
    },

    /// The statement takes a different number of parameters
    #[error("Statement expects {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// A parameter could not be coerced to its statement type
    #[error("Parameter ${position}: {source}")]
    Mapping {
        position: usize,
        #[source]
        source: MapError,
    },
}

/// The undecoded bytes of a column, whatever its type.
struct RawColumn<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawColumn(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode<'a, T: FromSql<'a>>(pg_type: &Type, raw: &'a [u8]) -> Result<T, ConversionError> {
    T::from_sql(pg_type, raw).map_err(|source| ConversionError::Malformed {
        pg_type: pg_type.to_string(),
        source,
    })
}

fn array<'a, T>(pg_type: &Type, raw: &'a [u8]) -> Result<Value, ConversionError>
where
    T: FromSql<'a> + Into<Value>,
{
    let items = decode::<Vec<Option<T>>>(pg_type, raw)?;
    Ok(Value::Array(items.into_iter().map(Value::from).collect()))
}

/// Read the column at `index`. SQL NULL becomes `Value::Null`.
pub fn column_value(row: &Row, index: usize) -> Result<Value, ConversionError> {
    let raw = row
        .try_get::<_, Option<RawColumn>>(index)
        .map_err(|source| ConversionError::Decode {
            column: row
                .columns()
                .get(index)
                .map_or_else(|| index.to_string(), |c| c.name().to_string()),
            source,
        })?;
    decode_value(row.columns()[index].type_(), raw.map(|r| r.0))
}

/// Decode one binary-format column value of type `pg_type`.
///
/// `None` is SQL NULL. Types without a dedicated arm are read as text when
/// the text codec accepts them.
pub fn decode_value(pg_type: &Type, raw: Option<&[u8]>) -> Result<Value, ConversionError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    let value = match *pg_type {
        Type::BOOL => decode::<bool>(pg_type, raw)?.into(),
        // Single-byte "char"
        Type::CHAR => Value::Char(char::from(decode::<i8>(pg_type, raw)? as u8)),
        Type::INT2 => decode::<i16>(pg_type, raw)?.into(),
        Type::INT4 => decode::<i32>(pg_type, raw)?.into(),
        Type::INT8 => decode::<i64>(pg_type, raw)?.into(),
        Type::OID => decode::<u32>(pg_type, raw)?.into(),
        Type::FLOAT4 => decode::<f32>(pg_type, raw)?.into(),
        Type::FLOAT8 => decode::<f64>(pg_type, raw)?.into(),
        Type::NUMERIC => decode::<Decimal>(pg_type, raw)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            decode::<String>(pg_type, raw)?.into()
        }
        Type::BYTEA => decode::<Vec<u8>>(pg_type, raw)?.into(),
        Type::UUID => decode::<Uuid>(pg_type, raw)?.into(),
        Type::DATE => decode::<NaiveDate>(pg_type, raw)?.into(),
        Type::TIME => decode::<NaiveTime>(pg_type, raw)?.into(),
        Type::TIMESTAMP => decode::<NaiveDateTime>(pg_type, raw)?.into(),
        Type::TIMESTAMPTZ => decode::<DateTime<Utc>>(pg_type, raw)?.into(),
        Type::JSON | Type::JSONB => decode::<serde_json::Value>(pg_type, raw)?.into(),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => array::<String>(pg_type, raw)?,
        Type::INT4_ARRAY => array::<i32>(pg_type, raw)?,
        Type::INT8_ARRAY => array::<i64>(pg_type, raw)?,
        Type::FLOAT8_ARRAY => array::<f64>(pg_type, raw)?,
        Type::BOOL_ARRAY => array::<bool>(pg_type, raw)?,
        _ if <String as FromSql>::accepts(pg_type) => decode::<String>(pg_type, raw)?.into(),
        _ => return Err(ConversionError::UnsupportedType(pg_type.to_string())),
    };
    Ok(value)
}

/// The coercion target for values bound to a parameter of this type.
///
/// Returns `None` for types that are bound without coercion.
pub fn target_type(pg_type: &Type) -> Option<TargetType> {
    let target = match *pg_type {
        Type::BOOL => TargetType::Bool,
        Type::CHAR => TargetType::Char,
        Type::INT2 => TargetType::Int16,
        Type::INT4 => TargetType::Int32,
        Type::INT8 => TargetType::Int64,
        Type::OID => TargetType::UInt32,
        Type::FLOAT4 => TargetType::Float32,
        Type::FLOAT8 => TargetType::Float64,
        Type::NUMERIC => TargetType::Decimal,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            TargetType::String
        }
        Type::BYTEA => TargetType::Bytes,
        Type::UUID => TargetType::Uuid,
        Type::DATE => TargetType::Date,
        Type::TIME => TargetType::Time,
        Type::TIMESTAMP => TargetType::DateTime,
        Type::TIMESTAMPTZ => TargetType::DateTimeTz,
        Type::JSON | Type::JSONB => TargetType::Json,
        _ => return None,
    };
    Some(target)
}
