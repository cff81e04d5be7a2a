//! The persistence contract the engine consumes, and the backends shipped with it.

pub mod json_backend;
pub mod memory;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{
    RecurrenceMeta, Transaction, TransactionKind, TransactionPatch, TransactionStatus,
};

pub use json_backend::JsonFileStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("operation not supported by store: {0}")]
    Unsupported(&'static str),
    #[error("store rejected write: {0}")]
    Rejected(String),
    #[error("no stored record matches {0}")]
    NoMatch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Errors after which the slower per-record path is worth one attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unsupported(_))
    }
}

/// Identifies a stored record. The key is used when both sides carry one;
/// otherwise the field tuple is compared, which is only a compatibility path
/// for records created without a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriteria {
    pub id: Option<Uuid>,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub series_id: Option<Uuid>,
    pub instance_number: Option<u32>,
}

impl MatchCriteria {
    pub fn for_transaction(txn: &Transaction) -> Self {
        Self {
            id: txn.has_key().then_some(txn.id),
            date: txn.date,
            description: txn.description.clone(),
            amount: txn.amount,
            kind: txn.kind,
            status: txn.status,
            series_id: txn.series_id(),
            instance_number: txn.instance_number(),
        }
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        if let Some(id) = self.id {
            if txn.has_key() {
                return txn.id == id;
            }
        }
        txn.date == self.date
            && txn.description == self.description
            && txn.amount == self.amount
            && txn.kind == self.kind
            && txn.status == self.status
            && txn.series_id() == self.series_id
            && txn.instance_number() == self.instance_number
    }
}

impl std::fmt::Display for MatchCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}"),
            None => write!(
                f,
                "{} `{}` {} {:?}/{:?} series={:?} #{:?}",
                self.date,
                self.description,
                self.amount,
                self.kind,
                self.status,
                self.series_id,
                self.instance_number
            ),
        }
    }
}

/// Field-level update sent to the store, carrying only what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    pub patch: TransactionPatch,
    /// Full replacement of the recurrence metadata, when any of it changed.
    pub recurrence: Option<RecurrenceMeta>,
}

impl FieldUpdate {
    pub fn between(before: &Transaction, after: &Transaction) -> Self {
        let recurrence = if before.recurrence != after.recurrence {
            after.recurrence.clone()
        } else {
            None
        };
        Self {
            patch: TransactionPatch::diff(before, after),
            recurrence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.recurrence.is_none()
    }

    pub fn apply(&self, txn: &mut Transaction) {
        if let Some(date) = self.patch.date {
            txn.date = date;
        }
        self.patch.merge_into(txn);
        if let Some(meta) = &self.recurrence {
            txn.recurrence = Some(meta.clone());
        }
    }
}

/// Narrow CRUD contract over the backing data store.
///
/// Every call is one round-trip; batch calls must be applied as a unit so
/// other readers never observe half of a series.
pub trait TransactionStore: Send + Sync {
    fn fetch_all(&self) -> StoreResult<Vec<Transaction>>;
    fn insert_one(&self, txn: &Transaction) -> StoreResult<Transaction>;
    fn insert_batch(&self, txns: &[Transaction]) -> StoreResult<Vec<Transaction>>;
    fn update_one(&self, criteria: &MatchCriteria, fields: &FieldUpdate) -> StoreResult<()>;
    fn delete_where(&self, criteria: &MatchCriteria) -> StoreResult<usize>;

    /// Bulk removal of a whole series. Stores without it fall back to
    /// per-record deletes at the caller.
    fn delete_batch_by_series_id(&self, _series_id: Uuid) -> StoreResult<usize> {
        Err(StoreError::Unsupported("delete_batch_by_series_id"))
    }
}

/// Shared in-place operations for stores that hold the whole collection.
pub(crate) mod records {
    use super::*;

    pub fn insert(records: &mut Vec<Transaction>, txn: &Transaction) -> Transaction {
        let mut stored = txn.clone();
        stored.ensure_key();
        records.push(stored.clone());
        stored
    }

    pub fn update(
        records: &mut [Transaction],
        criteria: &MatchCriteria,
        fields: &FieldUpdate,
    ) -> StoreResult<()> {
        let record = records
            .iter_mut()
            .find(|txn| criteria.matches(txn))
            .ok_or_else(|| StoreError::NoMatch(criteria.to_string()))?;
        fields.apply(record);
        Ok(())
    }

    pub fn delete(records: &mut Vec<Transaction>, criteria: &MatchCriteria) -> usize {
        let before = records.len();
        records.retain(|txn| !criteria.matches(txn));
        before - records.len()
    }

    pub fn delete_series(records: &mut Vec<Transaction>, series_id: Uuid) -> usize {
        let before = records.len();
        records.retain(|txn| txn.series_id() != Some(series_id));
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Frequency, RecurrenceRule};

    fn legacy(txn: &Transaction) -> Transaction {
        let mut copy = txn.clone();
        copy.id = Uuid::nil();
        copy
    }

    fn grocery() -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            "Groceries",
            Decimal::new(5630, 2),
            TransactionKind::Expense,
        )
    }

    #[test]
    fn keyed_criteria_ignore_changed_fields() {
        let txn = grocery();
        let criteria = MatchCriteria::for_transaction(&txn);
        let mut edited = txn.clone();
        edited.amount = Decimal::from(-60);
        assert!(criteria.matches(&edited));
        let mut other = grocery();
        other.date = txn.date;
        assert!(!criteria.matches(&other));
    }

    #[test]
    fn legacy_records_match_on_field_tuple() {
        let txn = legacy(&grocery());
        let criteria = MatchCriteria::for_transaction(&txn);
        assert_eq!(criteria.id, None);
        assert!(criteria.matches(&txn));
        let mut paid = txn.clone();
        paid.status = TransactionStatus::Completed;
        assert!(!criteria.matches(&paid));
    }

    #[test]
    fn field_update_carries_only_changes() {
        let base = grocery();
        let series = crate::ledger::generate_series(
            &base,
            &RecurrenceRule::new(Frequency::Weekly)
                .until(NaiveDate::from_ymd_opt(2024, 5, 18).unwrap()),
        )
        .unwrap();
        let before = series[1].clone();
        let mut after = before.clone();
        after.category = Some("Food".into());

        let update = FieldUpdate::between(&before, &after);
        assert_eq!(update.patch.category, Some(Some("Food".into())));
        assert!(update.patch.amount.is_none());
        assert!(update.recurrence.is_none());

        let mut target = before.clone();
        update.apply(&mut target);
        assert_eq!(target, after);
    }
}
