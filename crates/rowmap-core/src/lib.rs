//! Core types for the rowmap data mapper.
//!
//! This crate turns tabular result rows into typed entity instances or
//! dynamic property bags:
//!
//! - [`Value`] - Tagged runtime value of a column or member
//! - [`TargetType`] - Declared type of an entity member
//! - [`change_type`] - Coercion of a raw value into a declared type
//! - [`Entity`] / [`SchemaRegistry`] - Member mapping, built once per type
//! - [`Mapper`] - Row to entity materialization
//! - [`Record`] / [`RowSequence`] - Row source interface
//!
//! # Architecture
//!
//! ```text
//! rowmap-core (this crate)
//!    │
//!    ├─── postgresql-types  (implements Record/RowSequence for tokio-postgres)
//!    │
//!    └─── rowmap            (query helpers and CLI)
//! ```
//!
//! # Example
//!
//! ```rust
//! use rowmap_core::{member, Entity, Mapper, MemberDescriptor, MemoryRow, TargetType};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: i32,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     fn members() -> Vec<MemberDescriptor<Self>> {
//!         vec![
//!             member!(User, id: TargetType::Int32),
//!             member!(User, name: TargetType::String),
//!         ]
//!     }
//! }
//!
//! let row = MemoryRow::new().column("id", "7").column("name", "Ada");
//! let user: User = Mapper::new().create_instance(&row).unwrap();
//! assert_eq!(user.id, 7);
//! ```

pub mod convert;
pub mod error;
pub mod mapper;
pub mod row;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use convert::{change_type, zero_value};
pub use error::MapError;
pub use mapper::{DynamicInstances, Instances, Mapper, Materialized, Shape};
pub use row::{MemoryRow, MemoryRows, Record, RowSequence};
pub use schema::{Entity, EntitySchema, Getter, MemberDescriptor, SchemaRegistry, Setter};
pub use types::{EnumRepr, EnumType, IntType, ObjectType, TargetType};
pub use values::{DynamicBag, EnumValue, FromValue, Value, ValueKind};
