use chrono::{Datelike, Duration, Months, NaiveDate};

use super::business_day::nth_business_day;
use super::transaction::{Frequency, RecurrenceMeta};

/// Hard ceiling on the number of instances in one series.
pub const MAX_SERIES_INSTANCES: u32 = 50;

enum Candidate {
    Date(NaiveDate),
    /// The anchored business day does not exist in this month.
    Skip(NaiveDate),
    Exhausted,
}

/// Iterates the `(instance_number, date)` pairs a recurrence rule produces.
///
/// Every step is computed from the origin rather than from the previous
/// occurrence, so month-end clamping does not drift (Jan 31, Feb 29, Mar 31).
#[derive(Debug, Clone)]
pub struct Schedule {
    origin: NaiveDate,
    frequency: Frequency,
    business_day: Option<u32>,
    end_date: NaiveDate,
    step: u32,
    emitted: u32,
}

impl Schedule {
    pub fn new(
        origin: NaiveDate,
        frequency: Frequency,
        business_day: Option<u32>,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            origin,
            frequency,
            business_day: business_day.filter(|_| frequency.is_month_based()),
            end_date,
            step: 0,
            emitted: 0,
        }
    }

    pub fn for_meta(meta: &RecurrenceMeta) -> Self {
        Self::new(
            meta.original_date,
            meta.frequency,
            meta.business_day_anchor(),
            meta.end_date,
        )
    }

    fn candidate(&self, step: u32) -> Candidate {
        if step == 0 {
            return Candidate::Date(self.origin);
        }
        let weeks = |count: u32| {
            self.origin
                .checked_add_signed(Duration::weeks(i64::from(count)))
                .map_or(Candidate::Exhausted, Candidate::Date)
        };
        match self.frequency {
            Frequency::Weekly => weeks(step),
            Frequency::Biweekly => weeks(step.saturating_mul(2)),
            Frequency::Monthly => self.month_candidate(step),
            Frequency::Quarterly => self.month_candidate(step.saturating_mul(3)),
        }
    }

    fn month_candidate(&self, months: u32) -> Candidate {
        let Some(n) = self.business_day else {
            return self
                .origin
                .checked_add_months(Months::new(months))
                .map_or(Candidate::Exhausted, Candidate::Date);
        };
        let Some(month_start) = self
            .origin
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(months)))
        else {
            return Candidate::Exhausted;
        };
        match nth_business_day(month_start.year(), month_start.month(), n) {
            Some(date) => Candidate::Date(date),
            None => Candidate::Skip(month_start),
        }
    }
}

impl Iterator for Schedule {
    type Item = (u32, NaiveDate);

    fn next(&mut self) -> Option<Self::Item> {
        while self.emitted < MAX_SERIES_INSTANCES {
            let candidate = self.candidate(self.step);
            self.step = self.step.checked_add(1)?;
            match candidate {
                Candidate::Exhausted => return None,
                Candidate::Skip(month_start) => {
                    if month_start > self.end_date {
                        return None;
                    }
                }
                Candidate::Date(date) => {
                    // The origin is always emitted, even past the end date.
                    if date > self.end_date && self.emitted > 0 {
                        return None;
                    }
                    self.emitted += 1;
                    return Some((self.emitted, date));
                }
            }
        }
        None
    }
}
