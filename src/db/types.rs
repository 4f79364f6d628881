//! Query result types for pgprobe.
//!
//! Results are fully materialized, so a result can be walked from the first
//! row as many times as the formatter needs.

use std::fmt;
use std::time::Duration;

/// A single cell rendered to text; `None` is SQL NULL.
pub type Cell = Option<String>;

/// A row of rendered cells, one per column.
pub type Row = Vec<Cell>;

/// Represents the result of executing a SQL query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query.
    pub execution_time: Duration,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the cell at `(row, column)`, or `None` when out of bounds.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// First column of the first row.
    pub fn first_value(&self) -> Option<&Cell> {
        self.cell(0, 0)
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column label as the server reports it (the `AS` alias when present).
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Product and driver metadata reported after a successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub product_name: String,
    pub product_version: String,
    pub driver_name: String,
    pub driver_version: String,
}

impl fmt::Display for DriverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {} {}",
            self.product_name, self.product_version, self.driver_name, self.driver_version
        )
    }
}
