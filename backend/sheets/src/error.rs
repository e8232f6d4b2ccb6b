use thiserror::Error;

use crate::store::{BatchWriteError, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Store rejected request: {0}")]
    StoreRejected(String),

    #[error("{0} not found")]
    RecordNotFound(String),

    #[error("'{0}' not found in headers")]
    ColumnNotFound(String),

    #[error("Sheet '{0}' is empty")]
    EmptyLedger(String),

    #[error("Partially applied: {applied} of {total} cells written, failed at {failed_at}: {reason}")]
    PartialBatchFailure {
        applied: usize,
        total: usize,
        failed_at: String,
        reason: String,
    },
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => LedgerError::StoreUnavailable(msg),
            StoreError::NotFound(msg) => LedgerError::StoreNotFound(msg),
            StoreError::Rejected(msg) | StoreError::Protocol(msg) => LedgerError::StoreRejected(msg),
        }
    }
}

impl LedgerError {
    /// A batch with nothing committed is a plain store failure.
    pub fn from_batch(e: BatchWriteError, total: usize) -> Self {
        if e.applied == 0 {
            return e.source.into();
        }

        LedgerError::PartialBatchFailure {
            applied: e.applied,
            total,
            failed_at: e.failed_at.to_a1(),
            reason: e.source.to_string(),
        }
    }
}
