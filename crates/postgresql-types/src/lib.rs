//! PostgreSQL conversions for rowmap-core values.
//!
//! This crate connects rowmap-core to `tokio-postgres` in both directions.
//!
//! # Modules
//!
//! - [`forward`] - Value → PostgreSQL parameter conversion
//! - [`reverse`] - PostgreSQL column → Value conversion
//! - [`row`] - `Record` / `RowSequence` over query results
//!
//! # Example
//!
//! ```ignore
//! use postgresql_types::{bind_parameters, as_params, PostgreSQLRows};
//! use rowmap_core::{Mapper, Value};
//!
//! let statement = client.prepare("SELECT * FROM users WHERE id = $1").await?;
//! let params = bind_parameters(statement.params(), vec![Value::from("7")])?;
//! let rows = client.query(&statement, &as_params(&params)).await?;
//!
//! let users = Mapper::new().create_instances::<User, _>(PostgreSQLRows::new(rows));
//! ```

pub mod forward;
pub mod reverse;
pub mod row;

pub use forward::{as_params, bind_parameters, coerce_parameter, PostgreSQLValue};
pub use reverse::{column_value, decode_value, target_type, ConversionError};
pub use row::{PostgreSQLRow, PostgreSQLRows};
