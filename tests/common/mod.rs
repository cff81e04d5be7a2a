#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use recurring_ledger::{
    ledger::{Transaction, TransactionKind},
    storage::{FieldUpdate, MatchCriteria, StoreResult},
    EngineConfig, FixedClock, MemoryStore, SeriesManager, SessionContext, StoreError,
    TransactionStore,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn income(on: NaiveDate, description: &str, amount: i64) -> Transaction {
    Transaction::new(on, description, Decimal::from(amount), TransactionKind::Income)
}

pub fn expense(on: NaiveDate, description: &str, amount: i64) -> Transaction {
    Transaction::new(on, description, Decimal::from(amount), TransactionKind::Expense)
}

pub fn session_on(today: NaiveDate) -> SessionContext {
    SessionContext::new("tester", Arc::new(FixedClock::on(today)))
}

/// Manager over an empty in-memory store, with today fixed to `today`.
pub fn memory_manager(today: NaiveDate) -> SeriesManager {
    SeriesManager::load(
        session_on(today),
        Box::new(MemoryStore::new()),
        EngineConfig::default(),
    )
    .expect("load manager")
}

pub fn flaky_manager(store: &FlakyStore, config: EngineConfig) -> SeriesManager {
    SeriesManager::load(session_on(date(2025, 1, 1)), Box::new(store.clone()), config)
        .expect("load manager")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    InsertOne,
    InsertBatch,
    UpdateOne,
    DeleteWhere,
    DeleteSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Reject,
}

#[derive(Default)]
struct Script {
    steps: HashMap<Op, VecDeque<Option<Fault>>>,
    calls: HashMap<Op, usize>,
}

/// Store wrapper that fails scripted calls. Clones share the same script and
/// records, so a test can keep a handle after boxing one into a manager.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    script: Arc<Mutex<Script>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next calls of `op`: `None` lets a call through, `Some`
    /// fails it. Calls past the end of the script succeed.
    pub fn script(&self, op: Op, steps: &[Option<Fault>]) {
        let mut script = self.script.lock().expect("script lock");
        script.steps.entry(op).or_default().extend(steps.iter().copied());
    }

    pub fn fail_next(&self, op: Op, fault: Fault) {
        self.script(op, &[Some(fault)]);
    }

    pub fn calls(&self, op: Op) -> usize {
        let script = self.script.lock().expect("script lock");
        script.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn records(&self) -> Vec<Transaction> {
        self.inner.snapshot().expect("snapshot")
    }

    fn check(&self, op: Op) -> StoreResult<()> {
        let mut script = self.script.lock().expect("script lock");
        *script.calls.entry(op).or_default() += 1;
        let step = script.steps.get_mut(&op).and_then(VecDeque::pop_front);
        match step.flatten() {
            None => Ok(()),
            Some(Fault::Timeout) => Err(StoreError::Timeout(format!("{op:?}"))),
            Some(Fault::Reject) => Err(StoreError::Rejected(format!("{op:?}"))),
        }
    }
}

impl TransactionStore for FlakyStore {
    fn fetch_all(&self) -> StoreResult<Vec<Transaction>> {
        self.inner.fetch_all()
    }

    fn insert_one(&self, txn: &Transaction) -> StoreResult<Transaction> {
        self.check(Op::InsertOne)?;
        self.inner.insert_one(txn)
    }

    fn insert_batch(&self, txns: &[Transaction]) -> StoreResult<Vec<Transaction>> {
        self.check(Op::InsertBatch)?;
        self.inner.insert_batch(txns)
    }

    fn update_one(&self, criteria: &MatchCriteria, fields: &FieldUpdate) -> StoreResult<()> {
        self.check(Op::UpdateOne)?;
        self.inner.update_one(criteria, fields)
    }

    fn delete_where(&self, criteria: &MatchCriteria) -> StoreResult<usize> {
        self.check(Op::DeleteWhere)?;
        self.inner.delete_where(criteria)
    }

    fn delete_batch_by_series_id(&self, series_id: Uuid) -> StoreResult<usize> {
        self.check(Op::DeleteSeries)?;
        self.inner.delete_batch_by_series_id(series_id)
    }
}
