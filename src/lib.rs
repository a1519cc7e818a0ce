//! rowmap
//!
//! Maps PostgreSQL result rows onto typed entities and dynamic records.
//!
//! The mapping engine lives in `rowmap-core` and the PostgreSQL value
//! conversions in `postgresql-types`. This crate adds connection handling,
//! query helpers that pick the first or the only row, and the command-line
//! interface.
//!
//! # CLI Usage
//!
//! ```bash
//! # Every row as a JSON object
//! rowmap query "SELECT id, name FROM users WHERE active = $1" --param true \
//!   --connection-string "host=localhost user=postgres"
//!
//! # Exactly one row, or an error
//! rowmap single "SELECT * FROM users WHERE id = $1" --param 7
//!
//! # First column of the first row
//! rowmap scalar "SELECT count(*) FROM users"
//!
//! # Run a command inside a transaction that is rolled back
//! rowmap execute "DELETE FROM users WHERE id = $1" --param 7 --dry-run
//! ```

pub mod config;
pub mod connect;
pub mod query;

pub use config::{parse_duration_to_secs, ConnectionOpts};
pub use connect::connect;
pub use query::{
    execute, execute_scalar, fetch, first_row, query, query_dynamic, query_first,
    query_first_or_default, query_single, query_single_or_default, scalar, server_version,
    single_row, CommandOptions, QueryError, DEFAULT_TIMEOUT,
};
