//! Forward conversion: Value → PostgreSQL parameter
//!
//! This module wraps rowmap-core's `Value` so it can be bound as a
//! `tokio-postgres` query parameter, and coerces command parameters to the
//! types a prepared statement declares.

use crate::reverse::{target_type, ConversionError};
use bytes::BytesMut;
use postgres_types::{to_sql_checked, IsNull, Kind, ToSql, Type};
use rowmap_core::{change_type, Value};
use std::error::Error;

type BoxError = Box<dyn Error + Sync + Send>;

/// A `Value` bound as a query parameter.
///
/// `Value::Null` is sent as SQL NULL. Every other value is encoded with the
/// driver's codec for its Rust type, so the parameter's type must accept it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgreSQLValue(pub Value);

impl PostgreSQLValue {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for PostgreSQLValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl ToSql for PostgreSQLValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match &self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql_checked(ty, out),
            Value::Char(c) => {
                if *ty == Type::CHAR {
                    (u8::try_from(u32::from(*c))? as i8).to_sql_checked(ty, out)
                } else {
                    c.to_string().to_sql_checked(ty, out)
                }
            }
            Value::Int8(i) => i.to_sql_checked(ty, out),
            Value::Int16(i) => i.to_sql_checked(ty, out),
            Value::Int32(i) => i.to_sql_checked(ty, out),
            Value::Int64(i) => i.to_sql_checked(ty, out),
            Value::UInt8(i) => i16::from(*i).to_sql_checked(ty, out),
            Value::UInt16(i) => i32::from(*i).to_sql_checked(ty, out),
            Value::UInt32(i) => {
                if *ty == Type::OID {
                    i.to_sql_checked(ty, out)
                } else {
                    i64::from(*i).to_sql_checked(ty, out)
                }
            }
            Value::UInt64(i) => i64::try_from(*i)?.to_sql_checked(ty, out),
            Value::Float32(f) => f.to_sql_checked(ty, out),
            Value::Float64(f) => f.to_sql_checked(ty, out),
            Value::Decimal(d) => d.to_sql_checked(ty, out),
            Value::String(s) => s.to_sql_checked(ty, out),
            Value::Bytes(b) => b.to_sql_checked(ty, out),
            Value::Uuid(u) => u.to_sql_checked(ty, out),
            Value::Date(d) => d.to_sql_checked(ty, out),
            Value::Time(t) => t.to_sql_checked(ty, out),
            Value::DateTime(dt) => dt.to_sql_checked(ty, out),
            Value::DateTimeTz(dt) => dt.to_sql_checked(ty, out),
            Value::Json(j) => j.to_sql_checked(ty, out),
            Value::Enum(e) => match *ty {
                Type::INT2 => i16::try_from(e.raw())?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(e.raw())?.to_sql_checked(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                    e.to_string().to_sql_checked(ty, out)
                }
                _ => e.raw().to_sql_checked(ty, out),
            },
            Value::Array(values) => values
                .iter()
                .cloned()
                .map(PostgreSQLValue)
                .collect::<Vec<_>>()
                .to_sql_checked(ty, out),
            Value::Map(bag) => serde_json::to_value(bag)?.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Checked per value in `to_sql`
        true
    }

    to_sql_checked!();
}

/// Coerce `value` to the parameter type `ty`.
///
/// Array parameters coerce each element to the array's member type.
/// Types without a coercion target are passed through unchanged.
pub fn coerce_parameter(ty: &Type, value: Value) -> Result<Value, rowmap_core::MapError> {
    if let (Kind::Array(member), Value::Array(items)) = (ty.kind(), &value) {
        if let Some(target) = target_type(member) {
            return items
                .iter()
                .cloned()
                .map(|item| change_type(item, &target.clone().nullable(), true))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }
    }
    match target_type(ty) {
        // Parameters are always nullable
        Some(target) => change_type(value, &target.nullable(), true),
        None => Ok(value),
    }
}

/// Coerce each parameter to its statement type and wrap it for binding.
pub fn bind_parameters(
    types: &[Type],
    values: Vec<Value>,
) -> Result<Vec<PostgreSQLValue>, ConversionError> {
    if types.len() != values.len() {
        return Err(ConversionError::ParameterCount {
            expected: types.len(),
            actual: values.len(),
        });
    }

    types
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (ty, value))| {
            coerce_parameter(ty, value)
                .map(PostgreSQLValue)
                .map_err(|source| ConversionError::Mapping {
                    position: index + 1,
                    source,
                })
        })
        .collect()
}

/// Borrow bound parameters in the form `tokio-postgres` query methods take.
pub fn as_params(values: &[PostgreSQLValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
