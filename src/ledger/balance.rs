//! Running balances computed over the full history, independent of whatever
//! slice of it is being displayed.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::transaction::{Transaction, TransactionKey};

/// A transaction paired with the cumulative completed balance at its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedTransaction {
    pub transaction: Transaction,
    pub running_balance: Option<Decimal>,
}

/// Running balances keyed by transaction identity.
#[derive(Debug, Clone, Default)]
pub struct BalanceIndex {
    balances: HashMap<TransactionKey, Decimal>,
}

impl BalanceIndex {
    pub fn balance_of(&self, txn: &Transaction) -> Option<Decimal> {
        self.balances.get(&txn.key()).copied()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Attaches the precomputed balance to each transaction of a filtered or
    /// paginated view, preserving the view's order.
    pub fn annotate<'a, I>(&self, view: I) -> Vec<BalancedTransaction>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        view.into_iter()
            .map(|txn| BalancedTransaction {
                transaction: txn.clone(),
                running_balance: self.balance_of(txn),
            })
            .collect()
    }
}

fn chronological(all: &[Transaction]) -> Vec<&Transaction> {
    let mut ordered: Vec<&Transaction> = all.iter().collect();
    ordered.sort_by_key(|txn| txn.date);
    ordered
}

/// Walks `all` in date order, accumulating only completed amounts. Pending
/// records are keyed with the total reached so far but never add to it.
pub fn running_balances(all: &[Transaction]) -> BalanceIndex {
    let mut total = Decimal::ZERO;
    let mut balances = HashMap::with_capacity(all.len());
    for txn in chronological(all) {
        if txn.is_completed() {
            total += txn.amount;
        }
        balances.insert(txn.key(), total);
    }
    BalanceIndex { balances }
}

/// Returns every transaction in date order, annotated with its running balance.
pub fn reconcile_balances(all: &[Transaction]) -> Vec<BalancedTransaction> {
    let index = running_balances(all);
    index.annotate(chronological(all))
}
