use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use super::generator::instantiate;
use super::schedule::{Schedule, MAX_SERIES_INSTANCES};
use super::series::find_series;
use super::transaction::{Transaction, TransactionStatus};
use crate::errors::{LedgerError, Result};

/// Maximum number of instances a single backfill pass creates.
pub const MAX_BACKFILL_INSTANCES: usize = 12;

/// Builds the trailing instances missing between the latest member of a series
/// and its end date. The returned records are not yet part of `all`.
pub fn plan_backfill(all: &[Transaction], series_id: Uuid) -> Result<Vec<Transaction>> {
    let members = find_series(all, series_id, None);
    let Some(latest) = members.last().copied() else {
        return Err(LedgerError::SeriesNotFound(series_id));
    };
    let Some(meta) = latest.recurrence.as_ref() else {
        return Err(LedgerError::SeriesNotFound(series_id));
    };
    if !meta.active || latest.date >= meta.end_date {
        return Ok(Vec::new());
    }

    let existing: HashSet<_> = members.iter().map(|txn| txn.date).collect();
    let room = (MAX_SERIES_INSTANCES as usize).saturating_sub(members.len());
    let limit = MAX_BACKFILL_INSTANCES.min(room);
    let mut next_number = members
        .iter()
        .filter_map(|txn| txn.instance_number())
        .max()
        .unwrap_or(0)
        + 1;

    // Slots up to the highest instance number are already taken, even when
    // their member has since been moved to another date.
    let taken = next_number - 1;
    let mut created = Vec::new();
    for (slot, date) in Schedule::for_meta(meta) {
        if created.len() >= limit {
            break;
        }
        if slot <= taken || date <= latest.date || existing.contains(&date) {
            continue;
        }
        let mut txn = instantiate(latest, meta, next_number, date);
        txn.status = TransactionStatus::Pending;
        created.push(txn);
        next_number += 1;
    }

    debug!(
        %series_id,
        latest = %latest.date,
        end_date = %meta.end_date,
        created = created.len(),
        "planned backfill"
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::generator::generate_series;
    use crate::ledger::transaction::{Frequency, RecurrenceRule, TransactionKind};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(frequency: Frequency, start: NaiveDate, end: NaiveDate) -> Vec<Transaction> {
        let base = Transaction::new(start, "Insurance", Decimal::from(60), TransactionKind::Expense)
            .with_category("Insurance")
            .with_status(TransactionStatus::Completed);
        generate_series(&base, &RecurrenceRule::new(frequency).until(end)).unwrap()
    }

    #[test]
    fn fills_missing_trailing_instances() {
        let mut all = series(Frequency::Monthly, date(2025, 1, 10), date(2025, 6, 10));
        all.truncate(3);
        let series_id = all[0].series_id().unwrap();

        let created = plan_backfill(&all, series_id).unwrap();

        let dates: Vec<_> = created.iter().map(|t| t.date).collect();
        assert_eq!(
            dates,
            vec![date(2025, 4, 10), date(2025, 5, 10), date(2025, 6, 10)]
        );
        let numbers: Vec<_> = created.iter().map(|t| t.instance_number()).collect();
        assert_eq!(numbers, vec![Some(4), Some(5), Some(6)]);
        for txn in &created {
            assert_eq!(txn.status, TransactionStatus::Pending);
            assert_eq!(txn.amount, Decimal::from(-60));
            assert_eq!(txn.category.as_deref(), Some("Insurance"));
            assert_eq!(txn.series_id(), Some(series_id));
        }
    }

    #[test]
    fn complete_series_needs_nothing() {
        let all = series(Frequency::Monthly, date(2025, 1, 10), date(2025, 6, 10));
        let series_id = all[0].series_id().unwrap();
        assert!(plan_backfill(&all, series_id).unwrap().is_empty());
    }

    #[test]
    fn moved_last_member_still_holds_its_slot() {
        let mut all = series(Frequency::Monthly, date(2025, 1, 10), date(2025, 6, 10));
        all[5].date = date(2025, 6, 3);
        let series_id = all[0].series_id().unwrap();
        assert!(plan_backfill(&all, series_id).unwrap().is_empty());
    }

    #[test]
    fn unknown_series_is_reported() {
        let err = plan_backfill(&[], Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, LedgerError::SeriesNotFound(_)));
    }

    #[test]
    fn one_pass_is_capped() {
        let mut all = series(Frequency::Weekly, date(2025, 1, 6), date(2025, 12, 29));
        all.truncate(2);
        let series_id = all[0].series_id().unwrap();
        let created = plan_backfill(&all, series_id).unwrap();
        assert_eq!(created.len(), MAX_BACKFILL_INSTANCES);
        assert_eq!(created[0].date, date(2025, 1, 20));
    }

    #[test]
    fn keeps_business_day_anchor() {
        // 2025-03-03 is the first business day of March.
        let mut all = series(Frequency::Monthly, date(2025, 3, 3), date(2025, 8, 31));
        all.truncate(2);
        let series_id = all[0].series_id().unwrap();
        let created = plan_backfill(&all, series_id).unwrap();
        let dates: Vec<_> = created.iter().map(|t| t.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2025, 5, 1),
                date(2025, 6, 2),
                date(2025, 7, 1),
                date(2025, 8, 1)
            ]
        );
    }
}
