//! Declared member types.
//!
//! `TargetType` describes the semantic type an entity member is declared
//! with. The coercion engine converts raw column values into values of this
//! type, and the null policy depends on which of the three groups the type
//! belongs to:
//!
//! - value types (`Bool`, integers, `Enum`, ...), which have a zero value,
//! - nullable value types (`Nullable(inner)`), which accept `Null`,
//! - reference types (`String`, `Bytes`, `Json`, `Object`), whose null
//!   handling depends on the member's nullability annotation.

use crate::values::{Value, ValueKind};
use std::fmt;

/// Declared type of an entity member.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    // Value types
    /// Boolean
    Bool,
    /// Unicode scalar value
    Char,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit IEEE 754 floating point
    Float32,
    /// 64-bit IEEE 754 floating point
    Float64,
    /// Exact decimal
    Decimal,
    /// UUID (128-bit)
    Uuid,
    /// Date only
    Date,
    /// Time only
    Time,
    /// Timestamp without timezone
    DateTime,
    /// Timestamp in UTC
    DateTimeTz,
    /// Enumeration with an integer representation
    Enum(&'static EnumType),

    // Nullable value type
    /// Value type that also accepts null
    Nullable(Box<TargetType>),

    // Reference types
    /// Text
    String,
    /// Binary data
    Bytes,
    /// JSON document
    Json,
    /// Any other reference type
    Object(&'static ObjectType),
}

impl TargetType {
    /// Wrap this type as a nullable value type.
    pub fn nullable(self) -> Self {
        match self {
            Self::Nullable(_) => self,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// The type with any `Nullable` wrapper removed.
    pub fn underlying(&self) -> &TargetType {
        match self {
            Self::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Whether this is a `Nullable` wrapper.
    pub fn is_nullable_value_type(&self) -> bool {
        matches!(self, Self::Nullable(_))
    }

    /// Whether values of this type have a zero value instead of null.
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            Self::Nullable(_) | Self::String | Self::Bytes | Self::Json | Self::Object(_)
        )
    }

    /// The `Value` kind this type's values are stored as.
    pub fn storage_kind(&self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::Bool,
            Self::Char => ValueKind::Char,
            Self::Int8 => ValueKind::Int8,
            Self::Int16 => ValueKind::Int16,
            Self::Int32 => ValueKind::Int32,
            Self::Int64 => ValueKind::Int64,
            Self::UInt8 => ValueKind::UInt8,
            Self::UInt16 => ValueKind::UInt16,
            Self::UInt32 => ValueKind::UInt32,
            Self::UInt64 => ValueKind::UInt64,
            Self::Float32 => ValueKind::Float32,
            Self::Float64 => ValueKind::Float64,
            Self::Decimal => ValueKind::Decimal,
            Self::Uuid => ValueKind::Uuid,
            Self::Date => ValueKind::Date,
            Self::Time => ValueKind::Time,
            Self::DateTime => ValueKind::DateTime,
            Self::DateTimeTz => ValueKind::DateTimeTz,
            Self::Enum(_) => ValueKind::Enum,
            Self::Nullable(inner) => inner.storage_kind(),
            Self::String => ValueKind::String,
            Self::Bytes => ValueKind::Bytes,
            Self::Json => ValueKind::Json,
            Self::Object(object) => object.kind,
        }
    }

    /// The integer representation, for integer types.
    pub fn int_type(&self) -> Option<IntType> {
        match self {
            Self::Int8 => Some(IntType::Int8),
            Self::Int16 => Some(IntType::Int16),
            Self::Int32 => Some(IntType::Int32),
            Self::Int64 => Some(IntType::Int64),
            Self::UInt8 => Some(IntType::UInt8),
            Self::UInt16 => Some(IntType::UInt16),
            Self::UInt32 => Some(IntType::UInt32),
            Self::UInt64 => Some(IntType::UInt64),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(enum_type) => f.write_str(enum_type.name),
            Self::Object(object) => f.write_str(object.name),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            other => write!(f, "{}", other.storage_kind()),
        }
    }
}

/// Integer representation underlying an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl IntType {
    /// The corresponding target type.
    pub fn target(self) -> TargetType {
        match self {
            Self::Int8 => TargetType::Int8,
            Self::Int16 => TargetType::Int16,
            Self::Int32 => TargetType::Int32,
            Self::Int64 => TargetType::Int64,
            Self::UInt8 => TargetType::UInt8,
            Self::UInt16 => TargetType::UInt16,
            Self::UInt32 => TargetType::UInt32,
            Self::UInt64 => TargetType::UInt64,
        }
    }

    /// Inclusive range of representable values.
    pub fn range(self) -> (i128, i128) {
        match self {
            Self::Int8 => (i8::MIN.into(), i8::MAX.into()),
            Self::Int16 => (i16::MIN.into(), i16::MAX.into()),
            Self::Int32 => (i32::MIN.into(), i32::MAX.into()),
            Self::Int64 => (i64::MIN.into(), i64::MAX.into()),
            Self::UInt8 => (0, u8::MAX.into()),
            Self::UInt16 => (0, u16::MAX.into()),
            Self::UInt32 => (0, u32::MAX.into()),
            Self::UInt64 => (0, u64::MAX.into()),
        }
    }

    pub fn contains(self, value: i128) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }
}

/// Rust integer types usable as an enumeration representation.
pub trait EnumRepr: Copy {
    const INT_TYPE: IntType;
}

macro_rules! enum_repr {
    ($($ty:ty => $int_type:ident),* $(,)?) => {
        $(impl EnumRepr for $ty {
            const INT_TYPE: IntType = IntType::$int_type;
        })*
    };
}

enum_repr! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
}

/// Enumeration descriptor.
///
/// Raw values are stored as `i64`; `UInt64` enumerations keep their bit
/// pattern. Descriptors are compared by address, so each enumeration must
/// have exactly one `static` descriptor.
#[derive(Debug)]
pub struct EnumType {
    /// Enumeration name
    pub name: &'static str,
    /// Underlying integer representation
    pub repr: IntType,
    /// Named members and their raw values
    pub members: &'static [(&'static str, i64)],
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for EnumType {}

impl EnumType {
    /// Raw value of the member with the given name, ignoring case.
    pub fn member_named(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(member, _)| member.eq_ignore_ascii_case(name))
            .map(|(_, raw)| *raw)
    }

    /// Name of the first member with the given raw value.
    pub fn name_of(&self, raw: i64) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(_, value)| *value == raw)
            .map(|(name, _)| *name)
    }
}

/// Descriptor of a reference type other than `String`, `Bytes` and `Json`.
#[derive(Debug)]
pub struct ObjectType {
    /// Type name
    pub name: &'static str,
    /// Kind of `Value` instances of this type are stored as
    pub kind: ValueKind,
    /// Default constructor, if the type has one
    pub construct: Option<fn() -> Value>,
}

impl ObjectType {
    /// Default-construct an instance.
    pub fn default_instance(&self) -> Result<Value, crate::MapError> {
        match self.construct {
            Some(construct) => Ok(construct()),
            None => Err(crate::MapError::ConstructionFailure {
                type_name: self.name.to_string(),
            }),
        }
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

/// Declare an enumeration usable as a member type.
///
/// The enumeration is a transparent newtype over its representation, so any
/// raw value can be held, including values with no named member.
///
/// ```rust
/// rowmap_core::sql_enum! {
///     pub enum Color: i32 {
///         Red = 1,
///         Green = 2,
///     }
/// }
///
/// assert_eq!(Color::Green.name(), Some("Green"));
/// assert_eq!(Color(7).name(), None);
/// ```
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $($member:ident = $raw:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        $vis struct $name(pub $repr);

        #[allow(non_upper_case_globals, dead_code)]
        impl $name {
            $(pub const $member: Self = Self($raw);)*

            /// Descriptor used as the coercion target.
            pub fn enum_type() -> &'static $crate::EnumType {
                static ENUM_TYPE: $crate::EnumType = $crate::EnumType {
                    name: stringify!($name),
                    repr: <$repr as $crate::EnumRepr>::INT_TYPE,
                    members: &[$((stringify!($member), $raw as i64)),*],
                };
                &ENUM_TYPE
            }

            /// The member type to declare for fields of this enumeration.
            pub fn target() -> $crate::TargetType {
                $crate::TargetType::Enum(Self::enum_type())
            }

            /// Name of the member with this raw value, if any.
            pub fn name(self) -> Option<&'static str> {
                Self::enum_type().name_of(self.0 as i64)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}", self.0),
                }
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::MapError> {
                match value {
                    $crate::Value::Enum(e) if e.enum_type() == Self::enum_type() => {
                        Ok(Self(e.raw() as $repr))
                    }
                    other => Err($crate::MapError::unexpected(stringify!($name), &other)),
                }
            }
        }

        impl ::std::convert::From<$name> for $crate::Value {
            fn from(value: $name) -> Self {
                $crate::Value::Enum($crate::EnumValue::new($name::enum_type(), value.0 as i64))
            }
        }
    };
}
