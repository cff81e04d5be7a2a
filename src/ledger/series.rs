//! Locating series members and applying field updates across a series.

use chrono::{Duration, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use super::business_day::business_day_anchor;
use super::transaction::{Transaction, TransactionPatch, UpdateScope};
use crate::errors::{LedgerError, Result};

/// Returns the members of `series_id`, oldest first, optionally limited to
/// those dated on or before `up_to`.
pub fn find_series(
    all: &[Transaction],
    series_id: Uuid,
    up_to: Option<NaiveDate>,
) -> Vec<&Transaction> {
    let mut members: Vec<&Transaction> = find_series_indices(all, series_id, up_to)
        .into_iter()
        .map(|idx| &all[idx])
        .collect();
    members.sort_by_key(|txn| (txn.date, txn.instance_number()));
    members
}

pub fn find_series_indices(
    all: &[Transaction],
    series_id: Uuid,
    up_to: Option<NaiveDate>,
) -> Vec<usize> {
    all.iter()
        .enumerate()
        .filter(|(_, txn)| txn.series_id() == Some(series_id))
        .filter(|(_, txn)| up_to.map_or(true, |limit| txn.date <= limit))
        .map(|(idx, _)| idx)
        .collect()
}

/// Finds `instance` in `all` by its key, falling back to the field tuple for
/// records without one.
pub fn locate_instance(all: &[Transaction], instance: &Transaction) -> Option<usize> {
    let key = instance.key();
    all.iter().position(|txn| txn.key() == key)
}

/// Before and after images of one updated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChange {
    pub before: Transaction,
    pub after: Transaction,
}

/// Outcome of an in-memory synchronization.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub series_id: Option<Uuid>,
    pub scope: UpdateScope,
    /// Members found for the requested scope, including when nothing changed.
    pub located: usize,
    pub changes: Vec<MemberChange>,
    pub date_offset: Option<Duration>,
}

impl SyncPlan {
    fn empty(series_id: Option<Uuid>, scope: UpdateScope, located: usize) -> Self {
        Self {
            series_id,
            scope,
            located,
            changes: Vec::new(),
            date_offset: None,
        }
    }

    pub fn affected(&self) -> usize {
        self.located
    }
}

/// Applies `patch` to `instance` and, depending on `scope`, to its siblings.
///
/// A date change is applied as an offset: each member moves by the same number
/// of days and keeps its own instance number. Series scopes with fewer than two
/// members leave the collection untouched and report the count found.
pub fn synchronize(
    all: &mut [Transaction],
    instance: &Transaction,
    patch: &TransactionPatch,
    scope: UpdateScope,
) -> Result<SyncPlan> {
    if let Some(description) = &patch.description {
        if description.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "transaction description must not be empty".into(),
            ));
        }
    }
    let series_id = instance.series_id();

    let (indices, offset) = match (scope, series_id) {
        (UpdateScope::SingleInstance, _) => {
            let Some(idx) = locate_instance(all, instance) else {
                return Ok(SyncPlan::empty(series_id, scope, 0));
            };
            (vec![idx], None)
        }
        (_, None) => return Ok(SyncPlan::empty(None, scope, 0)),
        (UpdateScope::WholeSeries | UpdateScope::PastAndCurrent, Some(id)) => {
            let bound = (scope == UpdateScope::PastAndCurrent).then_some(instance.date);
            let indices = find_series_indices(all, id, bound);
            if indices.len() < 2 {
                debug!(series_id = %id, located = indices.len(), "not a multi-member series");
                return Ok(SyncPlan::empty(series_id, scope, indices.len()));
            }
            let offset = patch
                .date
                .filter(|date| *date != instance.date)
                .map(|date| date - instance.date);
            (indices, offset)
        }
    };

    // Shifted dates are computed up front so a failure leaves `all` untouched.
    let mut shifted = Vec::with_capacity(indices.len());
    for &idx in &indices {
        let member = &all[idx];
        let (date, origin) = match (scope, offset) {
            (UpdateScope::SingleInstance, _) => (patch.date.unwrap_or(member.date), None),
            (_, Some(delta)) => {
                let date = member.date.checked_add_signed(delta);
                let origin = member
                    .recurrence
                    .as_ref()
                    .map(|meta| meta.original_date.checked_add_signed(delta));
                match (date, origin) {
                    (Some(date), None) => (date, None),
                    (Some(date), Some(Some(origin))) => (date, Some(origin)),
                    _ => {
                        return Err(LedgerError::InvalidInput(format!(
                            "date shift of {} days is out of range",
                            delta.num_days()
                        )))
                    }
                }
            }
            (_, None) => (member.date, None),
        };
        shifted.push((date, origin));
    }

    let mut changes = Vec::with_capacity(indices.len());
    for (&idx, (date, origin)) in indices.iter().zip(shifted) {
        let member = &mut all[idx];
        let before = member.clone();
        member.date = date;
        if let (Some(origin), Some(meta)) = (origin, member.recurrence.as_mut()) {
            meta.original_date = origin;
            let ordinal = if meta.frequency.is_month_based() {
                business_day_anchor(origin)
            } else {
                None
            };
            meta.is_business_day_rule = ordinal.is_some();
            meta.business_day_number = ordinal;
        }
        patch.merge_into(member);
        changes.push(MemberChange {
            before,
            after: member.clone(),
        });
    }

    debug!(
        series_id = ?series_id,
        scope = ?scope,
        members = changes.len(),
        offset_days = offset.map(|delta| delta.num_days()),
        "synchronized series members"
    );
    Ok(SyncPlan {
        series_id,
        scope,
        located: changes.len(),
        changes,
        date_offset: offset,
    })
}
