//! Business-day arithmetic. A business day is Monday through Friday; public
//! holidays are not considered.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Upper bound (exclusive) on the ordinals probed by [`detect_business_day_ordinal`].
pub const BUSINESS_DAY_SEARCH_LIMIT: u32 = 22;

/// Highest ordinal that makes a series follow business days instead of the
/// calendar day. Every weekday is the Nth business day for some N, so only the
/// leading business days of a month are treated as intentional anchors.
pub const BUSINESS_DAY_ANCHOR_MAX_ORDINAL: u32 = 5;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Returns the `n`th business day of the month, or `None` when the month ends
/// before `n` business days have been counted.
pub fn nth_business_day(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }
    let mut day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut count = 0;
    while day.month() == month {
        if is_business_day(day) {
            count += 1;
            if count == n {
                return Some(day);
            }
        }
        day += Duration::days(1);
    }
    None
}

/// Finds the ordinal `n` for which `date` is the `n`th business day of its month.
pub fn detect_business_day_ordinal(date: NaiveDate) -> Option<u32> {
    (1..BUSINESS_DAY_SEARCH_LIMIT)
        .find(|&n| nth_business_day(date.year(), date.month(), n) == Some(date))
}

/// The business-day ordinal a new series starting on `date` should follow.
pub fn business_day_anchor(date: NaiveDate) -> Option<u32> {
    detect_business_day_ordinal(date).filter(|&n| n <= BUSINESS_DAY_ANCHOR_MAX_ORDINAL)
}
