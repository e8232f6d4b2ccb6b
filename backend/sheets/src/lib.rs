//! # Sheets
//!
//! Spreadsheet-as-database layer for the club's payment and attendance records.
//!
//!
//!
//! # Layers
//!
//! - [`store::GridStore`]: raw string grid, one worksheet at a time, 1-based addressing
//! - [`ledger::Ledger`]: typed records over the two worksheets, no grid coordinates leak above it
//!
//! Control flow is request -> ledger method -> one or more grid calls -> typed result or
//! [`error::LedgerError`]. No caching, no background work.
//!
//!
//!
//! # Stores
//!
//! - [`google::GoogleSheets`]: the production store, Sheets v4 values API
//! - [`memory::MemoryGrid`]: in-process grid with the same quirks, for development and tests
//!
//!
//!
//! # Known Hazards
//!
//! ## Duplicate date columns
//! Creating a date column is read-then-append. The ledger serializes it behind a lock, which
//! covers every submission going through one process. Two processes writing the same spreadsheet
//! can still both append the same new date.
//!
//! ## Partial batches
//! Attendance writes are not atomic. A failure partway reports
//! [`error::LedgerError::PartialBatchFailure`] with how many cells landed, nothing is rolled back.
//!
//! ## Date ordering
//! Player detail sorts dates in reverse lexical order. Labels that are not zero-padded
//! `YYYY-MM-DD` will not come out most-recent-first.
pub mod address;
pub mod config;
pub mod error;
pub mod google;
pub mod ledger;
pub mod memory;
pub mod records;
pub mod store;

pub use error::LedgerError;
pub use ledger::{Ledger, LedgerConfig};
pub use memory::MemoryGrid;
pub use store::{GridStore, StoreError};
