//! # Memory Grid
//!
//! In-process stand-in for the remote spreadsheet, used for local development and tests.
//!
//! Mirrors the observable quirks of the remote store:
//! - trailing blank cells are dropped from rows and columns on read
//! - trailing blank rows are dropped from full reads
//! - unknown worksheets are `NotFound`
//!
//! Batches can be told to fail after a given number of cells, leaving the prefix committed.
use std::{collections::HashMap, fs::read_to_string, path::Path};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    address::CellAddress,
    store::{BatchWriteError, CellWrite, GridStore, Row, StoreError, position_in_column},
};

#[derive(Default)]
struct Inner {
    sheets: HashMap<String, Vec<Row>>,
    fail_batches_after: Option<usize>,
}

#[derive(Default)]
pub struct MemoryGrid {
    inner: RwLock<Inner>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<R, C>(mut self, name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| trimmed(row.into_iter().map(Into::into).collect()))
            .collect();

        self.inner.get_mut().sheets.insert(name.to_string(), rows);
        self
    }

    /// Loads a JSON object of `{ "worksheet": [["cell", ...], ...] }`.
    pub fn from_fixture(path: &Path) -> Result<Self, StoreError> {
        let raw = read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let sheets: HashMap<String, Vec<Row>> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Protocol(format!("{}: {e}", path.display())))?;

        let sheets = sheets
            .into_iter()
            .map(|(name, rows)| (name, rows.into_iter().map(trimmed).collect()))
            .collect();

        Ok(Self {
            inner: RwLock::new(Inner {
                sheets,
                fail_batches_after: None,
            }),
        })
    }

    /// Makes every following batch fail once `cells` writes of it have been applied.
    pub async fn fail_batches_after(&self, cells: Option<usize>) {
        self.inner.write().await.fail_batches_after = cells;
    }

    /// Raw snapshot of a worksheet, as stored.
    pub async fn snapshot(&self, table: &str) -> Option<Vec<Row>> {
        self.inner.read().await.sheets.get(table).cloned()
    }
}

fn trimmed(mut row: Row) -> Row {
    while row.last().is_some_and(|cell| cell.is_empty()) {
        row.pop();
    }
    row
}

fn not_found(table: &str) -> StoreError {
    StoreError::NotFound(format!("worksheet '{table}'"))
}

fn put(rows: &mut Vec<Row>, address: CellAddress, value: &str) {
    if rows.len() < address.row {
        rows.resize_with(address.row, Vec::new);
    }

    let row = &mut rows[address.row - 1];
    if row.len() < address.col {
        row.resize(address.col, String::new());
    }

    row[address.col - 1] = value.to_string();
    *row = trimmed(std::mem::take(row));
}

fn check_address(address: CellAddress) -> Result<(), StoreError> {
    if address.row == 0 || address.col == 0 {
        return Err(StoreError::Rejected(format!(
            "invalid address row {} col {}",
            address.row, address.col
        )));
    }
    Ok(())
}

#[async_trait]
impl GridStore for MemoryGrid {
    async fn read_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows = inner.sheets.get(table).cloned().ok_or_else(|| not_found(table))?;

        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }

        debug!("read_all {table}: {} rows", rows.len());
        Ok(rows)
    }

    async fn read_row(&self, table: &str, row: usize) -> Result<Row, StoreError> {
        let inner = self.inner.read().await;
        let rows = inner.sheets.get(table).ok_or_else(|| not_found(table))?;

        Ok(row
            .checked_sub(1)
            .and_then(|index| rows.get(index))
            .cloned()
            .unwrap_or_default())
    }

    async fn read_column(&self, table: &str, col: usize) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let rows = inner.sheets.get(table).ok_or_else(|| not_found(table))?;

        let Some(index) = col.checked_sub(1) else {
            return Ok(Vec::new());
        };

        let column = rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect();

        Ok(trimmed(column))
    }

    async fn find_in_column(
        &self,
        table: &str,
        col: usize,
        value: &str,
    ) -> Result<Option<CellAddress>, StoreError> {
        let column = self.read_column(table, col).await?;
        Ok(position_in_column(&column, col, value))
    }

    async fn write_cell(&self, table: &str, address: CellAddress, value: &str) -> Result<(), StoreError> {
        check_address(address)?;

        let mut inner = self.inner.write().await;
        let rows = inner.sheets.get_mut(table).ok_or_else(|| not_found(table))?;

        put(rows, address, value);
        debug!("write_cell {table}!{address} = {value:?}");
        Ok(())
    }

    async fn write_cells(&self, table: &str, writes: &[CellWrite]) -> Result<(), BatchWriteError> {
        let mut inner = self.inner.write().await;
        let fail_after = inner.fail_batches_after;

        let Some(rows) = inner.sheets.get_mut(table) else {
            return match writes.first() {
                Some(first) => Err(BatchWriteError {
                    applied: 0,
                    failed_at: first.address,
                    source: not_found(table),
                }),
                None => Ok(()),
            };
        };

        for (applied, write) in writes.iter().enumerate() {
            let injected = fail_after
                .filter(|limit| applied >= *limit)
                .map(|_| StoreError::Unavailable("injected batch failure".to_string()));

            if let Some(source) = injected.or_else(|| check_address(write.address).err()) {
                return Err(BatchWriteError {
                    applied,
                    failed_at: write.address,
                    source,
                });
            }

            put(rows, write.address, &write.value);
        }

        debug!("write_cells {table}: {} cells", writes.len());
        Ok(())
    }
}
