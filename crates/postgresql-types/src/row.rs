//! Row sequence adapter for `tokio_postgres` results.

use crate::reverse::column_value;
use rowmap_core::{MapError, Record, RowSequence, Value};
use tokio_postgres::Row;

/// A `tokio_postgres::Row` viewed as a [`Record`].
pub struct PostgreSQLRow(Row);

impl PostgreSQLRow {
    pub fn new(row: Row) -> Self {
        Self(row)
    }

    pub fn into_inner(self) -> Row {
        self.0
    }
}

impl From<Row> for PostgreSQLRow {
    fn from(row: Row) -> Self {
        Self(row)
    }
}

impl Record for PostgreSQLRow {
    fn field_count(&self) -> usize {
        self.0.len()
    }

    fn name(&self, index: usize) -> &str {
        self.0.columns()[index].name()
    }

    fn value(&self, index: usize) -> Result<Value, MapError> {
        column_value(&self.0, index).map_err(|e| MapError::Source(e.to_string()))
    }
}

/// The rows returned by a query, consumed front to back.
#[derive(Default)]
pub struct PostgreSQLRows {
    rows: std::vec::IntoIter<Row>,
    closed: bool,
}

impl PostgreSQLRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Rows not yet read.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl std::fmt::Debug for PostgreSQLRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgreSQLRows")
            .field("remaining", &self.remaining())
            .field("closed", &self.closed)
            .finish()
    }
}

impl From<Vec<Row>> for PostgreSQLRows {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

impl RowSequence for PostgreSQLRows {
    type Row = PostgreSQLRow;

    fn next_row(&mut self) -> Option<Result<PostgreSQLRow, MapError>> {
        if self.closed {
            return None;
        }
        self.rows.next().map(|row| Ok(PostgreSQLRow(row)))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            // Release the buffered rows
            self.rows = Vec::new().into_iter();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rows_close() {
        let mut rows = PostgreSQLRows::new(Vec::new());
        assert!(rows.next_row().is_none());
        assert!(!rows.is_closed());

        rows.close();
        rows.close();
        assert!(rows.is_closed());
        assert_eq!(rows.remaining(), 0);
    }
}
