use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use super::transaction::{Frequency, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledStatus {
    Overdue,
    Upcoming,
    Future,
}

impl ScheduledStatus {
    pub fn classify(scheduled: NaiveDate, reference: NaiveDate, window_days: i64) -> Self {
        if scheduled < reference {
            return ScheduledStatus::Overdue;
        }
        // A window reaching past the calendar's range covers every later date.
        let horizon = Duration::try_days(window_days)
            .and_then(|span| reference.checked_add_signed(span))
            .unwrap_or(if window_days > 0 {
                NaiveDate::MAX
            } else {
                NaiveDate::MIN
            });
        if scheduled <= horizon {
            ScheduledStatus::Upcoming
        } else {
            ScheduledStatus::Future
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSummary {
    pub series_id: Uuid,
    pub description: String,
    pub frequency: Frequency,
    pub end_date: NaiveDate,
    pub members: usize,
    pub completed: usize,
    pub overdue: usize,
    pub upcoming: usize,
    pub next_due: Option<NaiveDate>,
}

/// Summarizes every series in `all` relative to `reference` (usually today).
/// Only pending members count as overdue or upcoming.
pub fn summarize_series(
    all: &[Transaction],
    reference: NaiveDate,
    window_days: i64,
) -> Vec<SeriesSummary> {
    let mut grouped: BTreeMap<Uuid, Vec<&Transaction>> = BTreeMap::new();
    for txn in all {
        if let Some(series_id) = txn.series_id() {
            grouped.entry(series_id).or_default().push(txn);
        }
    }

    let mut summaries = Vec::with_capacity(grouped.len());
    for (series_id, mut members) in grouped {
        members.sort_by_key(|txn| txn.date);
        let Some(meta) = members.last().and_then(|txn| txn.recurrence.as_ref()) else {
            continue;
        };
        let mut summary = SeriesSummary {
            series_id,
            description: members[0].description.clone(),
            frequency: meta.frequency,
            end_date: meta.end_date,
            members: members.len(),
            completed: 0,
            overdue: 0,
            upcoming: 0,
            next_due: None,
        };
        for txn in &members {
            if txn.is_completed() {
                summary.completed += 1;
                continue;
            }
            match ScheduledStatus::classify(txn.date, reference, window_days) {
                ScheduledStatus::Overdue => summary.overdue += 1,
                ScheduledStatus::Upcoming => summary.upcoming += 1,
                ScheduledStatus::Future => {}
            }
            if summary.next_due.is_none() && txn.date >= reference {
                summary.next_due = Some(txn.date);
            }
        }
        summaries.push(summary);
    }

    summaries.sort_by_key(|summary| (summary.next_due.is_none(), summary.next_due));
    summaries
}
