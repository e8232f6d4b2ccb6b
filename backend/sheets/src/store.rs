//! # Grid Store
//!
//! Capability over named, two-dimensional, string-valued worksheets inside one spreadsheet.
//!
//! ## Contract
//! - Rows and columns are 1-based, row 1 is the header row
//! - Rows may come back shorter than the header row, trailing blanks are omitted by the store
//! - No schema, no types beyond strings, no transactions
//! - Every call is a remote round trip, concurrent writers can interleave between calls
//! - Batched writes are best effort, a failure may leave a committed prefix behind
use async_trait::async_trait;
use thiserror::Error;

use crate::address::CellAddress;

pub type Row = Vec<String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection or credentials not usable. Retryable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Unexpected store response: {0}")]
    Protocol(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Batch write failed at {failed_at} after {applied} cells: {source}")]
pub struct BatchWriteError {
    /// Number of leading cells known to be committed.
    pub applied: usize,
    pub failed_at: CellAddress,
    pub source: StoreError,
}

/// One pending write in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub address: CellAddress,
    pub value: String,
}

impl CellWrite {
    pub fn new(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self {
            address: CellAddress::new(row, col),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait GridStore: Send + Sync {
    /// All rows of the worksheet. An empty worksheet yields no rows.
    async fn read_all(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    async fn read_row(&self, table: &str, row: usize) -> Result<Row, StoreError>;

    async fn read_column(&self, table: &str, col: usize) -> Result<Vec<String>, StoreError>;

    /// First cell in `col` whose value equals `value` exactly.
    async fn find_in_column(
        &self,
        table: &str,
        col: usize,
        value: &str,
    ) -> Result<Option<CellAddress>, StoreError>;

    async fn write_cell(&self, table: &str, address: CellAddress, value: &str) -> Result<(), StoreError>;

    async fn write_cells(&self, table: &str, writes: &[CellWrite]) -> Result<(), BatchWriteError>;
}

/// Position of `value` in a column read from the store, as a 1-based address.
pub fn position_in_column(column: &[String], col: usize, value: &str) -> Option<CellAddress> {
    column
        .iter()
        .position(|cell| cell == value)
        .map(|index| CellAddress::new(index + 1, col))
}
