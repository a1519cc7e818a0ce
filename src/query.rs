//! Query helpers over `tokio-postgres`.
//!
//! Every helper prepares the command, coerces its parameters to the
//! statement's parameter types, runs it under the command timeout and maps
//! the resulting rows. They accept any [`GenericClient`], so they run on a
//! plain `Client` or inside a `Transaction`.

use postgresql_types::{as_params, bind_parameters, ConversionError, PostgreSQLRows};
use rowmap_core::{
    change_type, DynamicBag, Entity, FromValue, MapError, Mapper, Record, RowSequence,
    TargetType, Value,
};
use std::future::Future;
use std::time::Duration;
use tokio_postgres::GenericClient;
use tracing::{debug, info};

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-command execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    /// Time allowed for the command, `None` to wait indefinitely
    pub timeout: Option<Duration>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl CommandOptions {
    /// Options with a timeout in seconds, where 0 disables the timeout.
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }
}

/// Errors raised by the query helpers.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("The result set is empty.")]
    EmptyResultSet,

    #[error("The result set is empty or contains more than one record.")]
    NotSingle,

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Parameter conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Row mapping failed: {0}")]
    Mapping(#[from] MapError),
}

// ============================================================================
// Row selection
// ============================================================================

/// Take the first row and close the sequence. `None` when it is empty.
pub fn first_row<S: RowSequence>(mut rows: S) -> Result<Option<S::Row>, MapError> {
    let first = rows.next_row().transpose();
    rows.close();
    first
}

/// Take the only row and close the sequence.
///
/// `None` when the sequence is empty or holds more than one row.
pub fn single_row<S: RowSequence>(mut rows: S) -> Result<Option<S::Row>, MapError> {
    let result = match rows.next_row().transpose() {
        Ok(Some(row)) => match rows.next_row().transpose() {
            Ok(None) => Ok(Some(row)),
            Ok(Some(_)) => Ok(None),
            Err(e) => Err(e),
        },
        other => other,
    };
    rows.close();
    result
}

/// First column of the first row, `None` when there is no such column.
pub fn scalar<S: RowSequence>(rows: S) -> Result<Option<Value>, MapError> {
    match first_row(rows)? {
        Some(row) if row.field_count() > 0 => row.value(0).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Execution
// ============================================================================

async fn with_timeout<T, F>(options: &CommandOptions, future: F) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    match options.timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| QueryError::Timeout(limit))?,
        None => future.await,
    }
}

/// Run a query and return its rows as a row sequence.
pub async fn fetch<C: GenericClient>(
    client: &C,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<PostgreSQLRows, QueryError> {
    with_timeout(options, async {
        let statement = client.prepare(sql).await?;
        let bound = bind_parameters(statement.params(), params)?;
        let rows = client.query(&statement, &as_params(&bound)).await?;
        debug!(rows = rows.len(), "Query returned");
        Ok::<_, QueryError>(PostgreSQLRows::new(rows))
    })
    .await
}

/// Run a query and map every row to a `T`.
pub async fn query<T: Entity, C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<Vec<T>, QueryError> {
    let rows = fetch(client, sql, params, options).await?;
    let items = mapper
        .create_instances::<T, _>(rows)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Run a query and copy every row into a dynamic bag.
pub async fn query_dynamic<C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<Vec<DynamicBag>, QueryError> {
    let rows = fetch(client, sql, params, options).await?;
    let items = mapper
        .create_dynamics(rows)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Map the first row. Fails with `EmptyResultSet` when there is none.
pub async fn query_first<T: Entity, C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<T, QueryError> {
    query_first_or_default(client, mapper, sql, params, options)
        .await?
        .ok_or(QueryError::EmptyResultSet)
}

pub async fn query_first_or_default<T: Entity, C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<Option<T>, QueryError> {
    let rows = fetch(client, sql, params, options).await?;
    match first_row(rows)? {
        Some(row) => Ok(Some(mapper.create_instance(&row)?)),
        None => Ok(None),
    }
}

/// Map the only row. Fails with `NotSingle` unless there is exactly one.
pub async fn query_single<T: Entity, C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<T, QueryError> {
    query_single_or_default(client, mapper, sql, params, options)
        .await?
        .ok_or(QueryError::NotSingle)
}

pub async fn query_single_or_default<T: Entity, C: GenericClient>(
    client: &C,
    mapper: &Mapper,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<Option<T>, QueryError> {
    let rows = fetch(client, sql, params, options).await?;
    match single_row(rows)? {
        Some(row) => Ok(Some(mapper.create_instance(&row)?)),
        None => Ok(None),
    }
}

/// First column of the first row, `None` for an empty result.
pub async fn execute_scalar<C: GenericClient>(
    client: &C,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<Option<Value>, QueryError> {
    let rows = fetch(client, sql, params, options).await?;
    Ok(scalar(rows)?)
}

/// Run a command and return the number of rows it affected.
pub async fn execute<C: GenericClient>(
    client: &C,
    sql: &str,
    params: Vec<Value>,
    options: &CommandOptions,
) -> Result<u64, QueryError> {
    let affected = with_timeout(options, async {
        let statement = client.prepare(sql).await?;
        let bound = bind_parameters(statement.params(), params)?;
        Ok::<_, QueryError>(client.execute(&statement, &as_params(&bound)).await?)
    })
    .await?;
    info!(rows = affected, "Command executed");
    Ok(affected)
}

/// The server's version string.
pub async fn server_version<C: GenericClient>(
    client: &C,
    options: &CommandOptions,
) -> Result<String, QueryError> {
    let version = execute_scalar(client, "SHOW server_version", Vec::new(), options)
        .await?
        .ok_or(QueryError::EmptyResultSet)?;
    Ok(String::from_value(change_type(
        version,
        &TargetType::String,
        false,
    )?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::{MemoryRow, MemoryRows};

    fn rows(count: i32) -> MemoryRows {
        (1..=count)
            .map(|id| MemoryRow::new().column("id", id).column("name", "x"))
            .collect()
    }

    #[test]
    fn test_command_options() {
        assert_eq!(CommandOptions::default().timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(CommandOptions::with_timeout_secs(0).timeout, None);
        assert_eq!(
            CommandOptions::with_timeout_secs(5).timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_first_row() {
        let row = first_row(rows(3)).unwrap().unwrap();
        assert_eq!(row.value(0).unwrap(), Value::Int32(1));
        assert!(first_row(rows(0)).unwrap().is_none());
    }

    #[test]
    fn test_single_row() {
        assert!(single_row(rows(0)).unwrap().is_none());
        assert!(single_row(rows(2)).unwrap().is_none());

        let row = single_row(rows(1)).unwrap().unwrap();
        assert_eq!(row.value(1).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_scalar() {
        assert_eq!(scalar(rows(2)).unwrap(), Some(Value::Int32(1)));
        assert_eq!(scalar(rows(0)).unwrap(), None);
        assert_eq!(scalar(MemoryRows::new(vec![MemoryRow::new()])).unwrap(), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            QueryError::EmptyResultSet.to_string(),
            "The result set is empty."
        );
        assert_eq!(
            QueryError::NotSingle.to_string(),
            "The result set is empty or contains more than one record."
        );
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(10)),
        };
        let result: Result<(), QueryError> =
            with_timeout(&options, std::future::pending()).await;
        assert!(matches!(result, Err(QueryError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_no_timeout_passes_through() {
        let options = CommandOptions::with_timeout_secs(0);
        let result = with_timeout(&options, async { Ok::<_, QueryError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
