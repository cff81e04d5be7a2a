use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{records, FieldUpdate, MatchCriteria, StoreError, StoreResult, TransactionStore};
use crate::core::utils::write_atomic;
use crate::ledger::Transaction;

pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default = "StoreFile::current_version")]
    schema_version: u32,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl StoreFile {
    fn current_version() -> u32 {
        STORE_SCHEMA_VERSION
    }
}

/// Store persisting the whole collection to one JSON document.
///
/// Each call reads, modifies and rewrites the file under a process-local lock;
/// writes are staged to a temporary sibling and renamed into place, so a batch
/// either lands completely or not at all.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StoreError::Rejected("json store lock poisoned".into()))
    }

    fn read(&self) -> StoreResult<Vec<Transaction>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&data)?;
        if file.schema_version > STORE_SCHEMA_VERSION {
            return Err(StoreError::Rejected(format!(
                "store `{}` is from a newer schema version",
                self.path.display()
            )));
        }
        Ok(file.transactions)
    }

    fn write(&self, transactions: Vec<Transaction>) -> StoreResult<()> {
        let file = StoreFile {
            schema_version: STORE_SCHEMA_VERSION,
            transactions,
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), records = file.transactions.len(), "store written");
        Ok(())
    }

    fn modify<T, F>(&self, mutator: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Vec<Transaction>) -> StoreResult<T>,
    {
        let _guard = self.guard()?;
        let mut transactions = self.read()?;
        let outcome = mutator(&mut transactions)?;
        self.write(transactions)?;
        Ok(outcome)
    }
}

impl TransactionStore for JsonFileStore {
    fn fetch_all(&self) -> StoreResult<Vec<Transaction>> {
        let _guard = self.guard()?;
        self.read()
    }

    fn insert_one(&self, txn: &Transaction) -> StoreResult<Transaction> {
        self.modify(|all| Ok(records::insert(all, txn)))
    }

    fn insert_batch(&self, txns: &[Transaction]) -> StoreResult<Vec<Transaction>> {
        self.modify(|all| Ok(txns.iter().map(|txn| records::insert(all, txn)).collect()))
    }

    fn update_one(&self, criteria: &MatchCriteria, fields: &FieldUpdate) -> StoreResult<()> {
        self.modify(|all| records::update(all, criteria, fields))
    }

    fn delete_where(&self, criteria: &MatchCriteria) -> StoreResult<usize> {
        self.modify(|all| Ok(records::delete(all, criteria)))
    }

    fn delete_batch_by_series_id(&self, series_id: Uuid) -> StoreResult<usize> {
        self.modify(|all| Ok(records::delete_series(all, series_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{generate_series, Frequency, RecurrenceRule, TransactionKind};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("none.json"));
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn batch_insert_and_series_delete_roundtrip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let base = Transaction::new(
            date(2025, 1, 15),
            "Phone",
            Decimal::new(2999, 2),
            TransactionKind::Expense,
        );
        let series = generate_series(
            &base,
            &RecurrenceRule::new(Frequency::Monthly).until(date(2025, 4, 15)),
        )
        .unwrap();
        let series_id = series[0].series_id().unwrap();

        let store = JsonFileStore::new(&path);
        store.insert_batch(&series).unwrap();
        store
            .insert_one(&Transaction::new(
                date(2025, 2, 1),
                "Cinema",
                Decimal::from(12),
                TransactionKind::Expense,
            ))
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let loaded = reopened.fetch_all().unwrap();
        assert_eq!(&loaded[..4], &series[..]);
        assert_eq!(loaded.len(), 5);

        assert_eq!(reopened.delete_batch_by_series_id(series_id).unwrap(), 4);
        assert_eq!(reopened.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.json");
        fs::write(&path, r#"{"schema_version": 99, "transactions": []}"#).unwrap();
        let err = JsonFileStore::new(&path).fetch_all().unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }
}
