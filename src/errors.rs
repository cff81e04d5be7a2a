use thiserror::Error;
use uuid::Uuid;

use crate::storage::StoreError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error type that captures recurrence engine and persistence failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),
    #[error("Series not found: {0}")]
    SeriesNotFound(Uuid),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("Series {series_id} partially persisted: {succeeded} succeeded, {failed} failed")]
    PartialBatchFailure {
        series_id: Uuid,
        succeeded: usize,
        failed: usize,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LedgerError {
    /// True when the in-memory collection may now disagree with the backing store.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence(_) | LedgerError::PartialBatchFailure { .. }
        )
    }
}
