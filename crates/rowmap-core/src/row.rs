//! Row sources.
//!
//! A [`RowSequence`] is a forward-only, closable sequence of [`Record`]s.
//! Database adapters implement both traits; [`MemoryRows`] is an in-memory
//! implementation for tests and pre-fetched results.

use crate::error::MapError;
use crate::values::Value;

/// One result row.
pub trait Record {
    /// Number of columns.
    fn field_count(&self) -> usize;

    /// Name of the column at `index`.
    fn name(&self, index: usize) -> &str;

    /// Value of the column at `index`, `Value::Null` for database null.
    fn value(&self, index: usize) -> Result<Value, MapError>;

    /// Whether the column at `index` holds database null.
    fn is_null(&self, index: usize) -> Result<bool, MapError> {
        Ok(self.value(index)?.is_null())
    }
}

/// A forward-only sequence of rows.
pub trait RowSequence {
    type Row: Record;

    /// Advance to the next row. Returns `None` once exhausted or closed.
    fn next_row(&mut self) -> Option<Result<Self::Row, MapError>>;

    /// Release the sequence. Calling this more than once has no effect.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// An in-memory row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRow {
    columns: Vec<(String, Value)>,
}

impl MemoryRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Duplicate names are kept.
    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }
}

impl Record for MemoryRow {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, index: usize) -> &str {
        &self.columns[index].0
    }

    fn value(&self, index: usize) -> Result<Value, MapError> {
        self.columns
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| MapError::Source(format!("column index {index} out of range")))
    }
}

/// An in-memory row sequence.
#[derive(Debug, Default)]
pub struct MemoryRows {
    rows: std::vec::IntoIter<MemoryRow>,
    closed: bool,
}

impl MemoryRows {
    pub fn new(rows: Vec<MemoryRow>) -> Self {
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

impl RowSequence for MemoryRows {
    type Row = MemoryRow;

    fn next_row(&mut self) -> Option<Result<MemoryRow, MapError>> {
        if self.closed {
            return None;
        }
        self.rows.next().map(Ok)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FromIterator<MemoryRow> for MemoryRows {
    fn from_iter<I: IntoIterator<Item = MemoryRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
