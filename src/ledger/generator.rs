//! Expands a base transaction and a recurrence rule into a dated series.

use tracing::debug;
use uuid::Uuid;

use super::business_day::business_day_anchor;
use super::schedule::Schedule;
use super::transaction::{RecurrenceMeta, RecurrenceRule, Transaction};
use crate::errors::{LedgerError, Result};

/// Builds every instance of the series declared by `base` and `rule`.
///
/// An inactive rule returns `base` unchanged. Otherwise instance #1 sits on the
/// base date and later instances follow the rule's frequency until the end date
/// (one year after the base date when absent) or the series ceiling is reached.
/// Monthly and quarterly steps keep the business-day ordinal of the base date
/// when it is one of the leading business days of its month.
pub fn generate_series(base: &Transaction, rule: &RecurrenceRule) -> Result<Vec<Transaction>> {
    base.validate()?;
    if base.recurrence.is_some() {
        return Err(LedgerError::InvalidInput(
            "base transaction already belongs to a series".into(),
        ));
    }
    if !rule.active {
        return Ok(vec![base.clone()]);
    }

    // A rule ending before its base still yields instance #1, which must not
    // sit past its own end date.
    let end_date = rule.effective_end_date(base.date).max(base.date);
    let business_day_number = if rule.frequency.is_month_based() {
        business_day_anchor(base.date)
    } else {
        None
    };
    let series_id = Uuid::new_v4();
    let template = RecurrenceMeta {
        series_id,
        original_date: base.date,
        instance_number: 1,
        frequency: rule.frequency,
        end_date,
        active: true,
        is_business_day_rule: business_day_number.is_some(),
        business_day_number,
    };

    let series: Vec<Transaction> = Schedule::for_meta(&template)
        .map(|(instance_number, date)| instantiate(base, &template, instance_number, date))
        .collect();

    debug!(
        %series_id,
        frequency = %rule.frequency,
        %end_date,
        business_day = ?business_day_number,
        instances = series.len(),
        "generated recurrence series"
    );
    Ok(series)
}

/// Builds one member of a series from a reference transaction.
pub(crate) fn instantiate(
    reference: &Transaction,
    template: &RecurrenceMeta,
    instance_number: u32,
    date: chrono::NaiveDate,
) -> Transaction {
    let mut txn = reference.clone();
    txn.id = if instance_number == 1 && reference.has_key() {
        reference.id
    } else {
        Uuid::new_v4()
    };
    txn.date = date;
    txn.recurrence = Some(RecurrenceMeta {
        instance_number,
        ..template.clone()
    });
    txn
}
