//! Passes that restore series consistency after an individual member was edited.

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use super::series::MemberChange;
use super::transaction::{Transaction, TransactionPatch};

/// Records removed and rewritten by one correction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionPlan {
    pub removed: Vec<Transaction>,
    pub corrected: Vec<MemberChange>,
}

impl CorrectionPlan {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.corrected.is_empty()
    }
}

/// Whether an edit from `original` to `updated` calls for auto-correction.
///
/// Only recurring instances whose end date, amount, category or kind changed
/// qualify; marking paid or pending never does.
pub fn needs_correction(original: &Transaction, updated: &Transaction) -> bool {
    if updated.series_id().is_none() {
        return false;
    }
    let patch = TransactionPatch::diff(original, updated);
    if patch.is_status_only() {
        return false;
    }
    patch.end_date.is_some()
        || patch.amount.is_some()
        || patch.category.is_some()
        || patch.kind.is_some()
}

/// Runs the shrink and consistency passes for an edited series member.
pub fn plan_correction(
    all: &mut Vec<Transaction>,
    original: &Transaction,
    updated: &Transaction,
) -> CorrectionPlan {
    if !needs_correction(original, updated) {
        return CorrectionPlan::default();
    }
    let Some(series_id) = updated.series_id() else {
        return CorrectionPlan::default();
    };

    let mut plan = CorrectionPlan::default();
    if let (Some(before), Some(after)) = (&original.recurrence, &updated.recurrence) {
        if after.end_date < before.end_date {
            plan.removed = shrink_series(all, series_id, after.end_date);
        }
    }
    plan.corrected = republish_shared_fields(all, updated);
    plan
}

/// Removes every member of `series_id` dated after `new_end`.
pub fn shrink_series(
    all: &mut Vec<Transaction>,
    series_id: Uuid,
    new_end: NaiveDate,
) -> Vec<Transaction> {
    let removed = drain_where(all, |txn| {
        txn.series_id() == Some(series_id) && txn.date > new_end
    });
    debug!(%series_id, %new_end, removed = removed.len(), "shrink correction");
    removed
}

/// Copies amount, category, kind and the rule copy of `edited` onto every other
/// member of its series. Dates and statuses are left alone.
pub fn republish_shared_fields(all: &mut [Transaction], edited: &Transaction) -> Vec<MemberChange> {
    let (Some(series_id), Some(source)) = (edited.series_id(), edited.recurrence.as_ref()) else {
        return Vec::new();
    };
    let mut changes = Vec::new();
    for member in all
        .iter_mut()
        .filter(|txn| txn.series_id() == Some(series_id))
    {
        let before = member.clone();
        member.amount = edited.amount;
        member.category = edited.category.clone();
        member.kind = edited.kind;
        if let Some(meta) = member.recurrence.as_mut() {
            meta.frequency = source.frequency;
            meta.end_date = source.end_date;
            meta.active = source.active;
        }
        if *member != before {
            changes.push(MemberChange {
                before,
                after: member.clone(),
            });
        }
    }
    debug!(%series_id, corrected = changes.len(), "consistency correction");
    changes
}

/// Removes instances dated after their own recurrence end date.
pub fn sweep_invalid(all: &mut Vec<Transaction>) -> Vec<Transaction> {
    drain_where(all, |txn| {
        txn.recurrence
            .as_ref()
            .map_or(false, |meta| txn.date > meta.end_date)
    })
}

/// Same as [`sweep_invalid`], limited to one series.
pub fn sweep_series(all: &mut Vec<Transaction>, series_id: Uuid) -> Vec<Transaction> {
    drain_where(all, |txn| {
        txn.recurrence
            .as_ref()
            .map_or(false, |meta| meta.series_id == series_id && txn.date > meta.end_date)
    })
}

fn drain_where<F>(all: &mut Vec<Transaction>, predicate: F) -> Vec<Transaction>
where
    F: Fn(&Transaction) -> bool,
{
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(all.len());
    for txn in all.drain(..) {
        if predicate(&txn) {
            removed.push(txn);
        } else {
            kept.push(txn);
        }
    }
    *all = kept;
    removed.sort_by_key(|txn| txn.date);
    removed
}
