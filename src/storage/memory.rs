use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{records, FieldUpdate, MatchCriteria, StoreError, StoreResult, TransactionStore};
use crate::ledger::Transaction;

/// In-process store backed by a vector.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<Vec<Transaction>>,
    bulk_delete: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<Transaction>) -> Self {
        Self {
            records: Mutex::new(records),
            bulk_delete: true,
        }
    }

    /// A store that refuses bulk series deletion, forcing the per-record path.
    pub fn without_bulk_delete() -> Self {
        Self {
            bulk_delete: false,
            ..Self::new()
        }
    }

    pub fn snapshot(&self) -> StoreResult<Vec<Transaction>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Vec<Transaction>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for MemoryStore {
    fn fetch_all(&self) -> StoreResult<Vec<Transaction>> {
        self.snapshot()
    }

    fn insert_one(&self, txn: &Transaction) -> StoreResult<Transaction> {
        let mut guard = self.lock()?;
        Ok(records::insert(&mut guard, txn))
    }

    fn insert_batch(&self, txns: &[Transaction]) -> StoreResult<Vec<Transaction>> {
        let mut guard = self.lock()?;
        Ok(txns
            .iter()
            .map(|txn| records::insert(&mut guard, txn))
            .collect())
    }

    fn update_one(&self, criteria: &MatchCriteria, fields: &FieldUpdate) -> StoreResult<()> {
        let mut guard = self.lock()?;
        records::update(&mut guard, criteria, fields)
    }

    fn delete_where(&self, criteria: &MatchCriteria) -> StoreResult<usize> {
        let mut guard = self.lock()?;
        Ok(records::delete(&mut guard, criteria))
    }

    fn delete_batch_by_series_id(&self, series_id: Uuid) -> StoreResult<usize> {
        if !self.bulk_delete {
            return Err(StoreError::Unsupported("delete_batch_by_series_id"));
        }
        let mut guard = self.lock()?;
        Ok(records::delete_series(&mut guard, series_id))
    }
}
